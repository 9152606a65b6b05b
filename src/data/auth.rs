use bson::{doc, Document};
use mongodb::Database;
use utoipa::ToSchema;
use uuid::Uuid;

use super::admin::{Admin, ADMIN_COLLECTION_NAME};
use super::student::{Student, STUDENT_COLLECTION_NAME};
use super::{filter, now_bson};
use crate::error::ServiceError;
use crate::resp::jwt::IdentityClaims;
use crate::role::Role;

/// The account resolved for a verified identity, flattened to the fields
/// the rest of the backend cares about regardless of which collection it
/// came from.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub subject_id: String,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub is_approved: bool,
    pub is_blocked: bool,
    pub is_active: bool,
}

impl From<&Student> for AuthenticatedUser {
    fn from(student: &Student) -> Self {
        AuthenticatedUser {
            id: student.id,
            subject_id: student.subject_id.clone(),
            email: student.email.clone(),
            name: student.name.clone(),
            role: Role::Student,
            is_approved: student.is_approved,
            is_blocked: student.is_blocked,
            is_active: true,
        }
    }
}

impl From<&Admin> for AuthenticatedUser {
    fn from(admin: &Admin) -> Self {
        AuthenticatedUser {
            id: admin.id,
            subject_id: admin.subject_id.clone(),
            email: admin.email.clone(),
            name: admin.name.clone(),
            role: admin.role,
            is_approved: true,
            is_blocked: false,
            is_active: admin.is_active,
        }
    }
}

pub trait AuthDbExt {
    async fn find_by_subject(
        &self,
        subject: &str,
    ) -> Result<Option<AuthenticatedUser>, ServiceError>;

    async fn is_email_registered(&self, email: &str) -> Result<bool, ServiceError>;

    /// Resolves a verified identity to an account, creating one on first
    /// login. Re-login never duplicates; the second element reports
    /// whether the account is new.
    async fn login_or_register(
        &self,
        claims: &IdentityClaims,
        admin_emails: &[String],
    ) -> Result<(AuthenticatedUser, bool), ServiceError>;
}

impl AuthDbExt for Database {
    async fn find_by_subject(
        &self,
        subject: &str,
    ) -> Result<Option<AuthenticatedUser>, ServiceError> {
        let student = self
            .collection::<Student>(STUDENT_COLLECTION_NAME)
            .find_one(doc! { "subject_id": subject }, None)
            .await?;

        if let Some(student) = student {
            return Ok(Some(AuthenticatedUser::from(&student)));
        }

        let admin = self
            .collection::<Admin>(ADMIN_COLLECTION_NAME)
            .find_one(doc! { "subject_id": subject }, None)
            .await?;

        Ok(admin.as_ref().map(AuthenticatedUser::from))
    }

    async fn is_email_registered(&self, email: &str) -> Result<bool, ServiceError> {
        let student_count = self
            .collection::<Student>(STUDENT_COLLECTION_NAME)
            .count_documents(doc! { "email": email }, None)
            .await?;
        if student_count > 0 {
            return Ok(true);
        }

        let admin_count = self
            .collection::<Admin>(ADMIN_COLLECTION_NAME)
            .count_documents(doc! { "email": email }, None)
            .await?;

        Ok(admin_count > 0)
    }

    async fn login_or_register(
        &self,
        claims: &IdentityClaims,
        admin_emails: &[String],
    ) -> Result<(AuthenticatedUser, bool), ServiceError> {
        if let Some(existing) = self.find_by_subject(&claims.sub).await? {
            let collection = if existing.role.can_administer() {
                ADMIN_COLLECTION_NAME
            } else {
                STUDENT_COLLECTION_NAME
            };

            self.collection::<Document>(collection)
                .update_one(
                    filter::by_id(existing.id),
                    doc! { "$set": { "last_login": now_bson(), "updated_at": now_bson() } },
                    None,
                )
                .await?;

            return Ok((existing, false));
        }

        if self.is_email_registered(&claims.email).await? {
            return Err(ServiceError::Conflict(format!(
                "email {} is already registered to another account",
                claims.email
            )));
        }

        let is_admin = admin_emails
            .iter()
            .any(|email| email.eq_ignore_ascii_case(&claims.email));

        if is_admin {
            let admin = Admin::new(&claims.sub, &claims.email, claims.display_name());
            tracing::info!("provisioning admin account for {}", admin.email);

            self.collection::<Admin>(ADMIN_COLLECTION_NAME)
                .insert_one(&admin, None)
                .await?;

            Ok((AuthenticatedUser::from(&admin), true))
        } else {
            let student = Student::new(&claims.sub, &claims.email, claims.display_name());
            tracing::info!("registering student account for {}", student.email);

            self.collection::<Student>(STUDENT_COLLECTION_NAME)
                .insert_one(&student, None)
                .await?;

            Ok((AuthenticatedUser::from(&student), true))
        }
    }
}
