use chrono::{DateTime, Utc};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::EntityKind;

pub mod db;

pub static STUDENT_COLLECTION_NAME: &str = EntityKind::Student.collection_name();

fn true_bool() -> bool {
    true
}

/// A student account, created on first verified login. The relation lists
/// on this document are only ever written by the membership synchronizer.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Student {
    #[serde(default = "Uuid::new_v4", rename = "_id")]
    pub id: Uuid,
    /// Subject identifier assigned by the external identity provider.
    pub subject_id: String,
    #[serde(default)]
    pub name: String,
    pub email: String,

    #[serde(default)]
    pub is_approved: bool,
    #[serde(default)]
    pub is_blocked: bool,
    #[serde(default = "true_bool")]
    pub is_online_mode: bool,

    #[serde(default)]
    pub assigned_batches: Vec<Uuid>,
    #[serde(default)]
    pub assigned_tests: Vec<Uuid>,
    #[serde(default)]
    pub assigned_shifts: Vec<Uuid>,
    #[serde(default)]
    pub results: Vec<Uuid>,

    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Student {
    pub fn new(
        subject_id: impl ToString,
        email: impl ToString,
        name: impl ToString,
    ) -> Student {
        let now = Utc::now();

        Student {
            id: Uuid::new_v4(),
            subject_id: subject_id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            is_approved: false,
            is_blocked: false,
            is_online_mode: true,
            assigned_batches: vec![],
            assigned_tests: vec![],
            assigned_shifts: vec![],
            results: vec![],
            last_login: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_eligible(&self) -> bool {
        self.is_approved && !self.is_blocked
    }
}

/// Shallow shape embedded in populated responses.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StudentSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    pub email: String,
}

/// Approval filter used by the admin student listing.
#[derive(Debug, Clone, Copy, Eq, PartialEq, FromFormField)]
pub enum StudentStatus {
    Approved,
    Pending,
    Blocked,
}

/// A student with relation summaries populated, the shape returned by
/// every student-facing operation.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StudentView {
    pub student: Student,
    pub batches: Vec<super::batch::BatchSummary>,
    pub tests: Vec<super::test::TestSummary>,
    pub shifts: Vec<super::shift::ShiftSummary>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StudentStats {
    pub total: u64,
    pub approved: u64,
    pub pending: u64,
    pub blocked: u64,
}
