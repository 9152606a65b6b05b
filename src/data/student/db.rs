use bson::doc;
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::{Client, Database};
use rocket::futures::TryStreamExt;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Student, StudentStats, StudentStatus, StudentView, STUDENT_COLLECTION_NAME};
use crate::data::batch::db::Pagination;
use crate::data::batch::{BatchSummary, BATCH_COLLECTION_NAME};
use crate::data::id::{normalize_replacement, normalize_required, IdRef};
use crate::data::membership::{self, Relation};
use crate::data::shift::{ShiftSummary, SHIFT_COLLECTION_NAME};
use crate::data::test::{TestSummary, TEST_COLLECTION_NAME};
use crate::data::{filter, now_bson};
use crate::error::{EntityKind, ServiceError};
use crate::middleware::paging::PageState;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StudentPage {
    pub students: Vec<Student>,
    pub pagination: Pagination,
}

pub trait StudentDbExt {
    async fn list_students(
        &self,
        page: PageState,
        status: Option<StudentStatus>,
        search: Option<&str>,
    ) -> Result<StudentPage, ServiceError>;

    async fn get_student(&self, id: Uuid) -> Result<Student, ServiceError>;
    async fn student_view(&self, id: Uuid) -> Result<StudentView, ServiceError>;

    async fn approve_student(&self, id: Uuid) -> Result<Student, ServiceError>;
    async fn block_student(&self, id: Uuid) -> Result<Student, ServiceError>;
    async fn unblock_student(&self, id: Uuid) -> Result<Student, ServiceError>;

    async fn bulk_approve(&self, ids: &[IdRef]) -> Result<u64, ServiceError>;
    async fn bulk_block(&self, ids: &[IdRef]) -> Result<u64, ServiceError>;

    /// Wholesale sync entry points used by the admin student editor.
    async fn replace_batches(
        &self,
        client: &Client,
        id: Uuid,
        ids: &[IdRef],
    ) -> Result<StudentView, ServiceError>;
    async fn replace_tests(
        &self,
        client: &Client,
        id: Uuid,
        ids: &[IdRef],
    ) -> Result<StudentView, ServiceError>;
    async fn replace_shifts(
        &self,
        client: &Client,
        id: Uuid,
        ids: &[IdRef],
    ) -> Result<StudentView, ServiceError>;

    async fn assign_shift(
        &self,
        client: &Client,
        student: Uuid,
        shift: Uuid,
    ) -> Result<StudentView, ServiceError>;

    async fn delete_student(&self, client: &Client, id: Uuid) -> Result<(), ServiceError>;

    async fn student_stats(&self) -> Result<StudentStats, ServiceError>;
}

fn status_filter(status: StudentStatus) -> bson::Document {
    match status {
        StudentStatus::Approved => doc! { "is_approved": true, "is_blocked": false },
        StudentStatus::Pending => doc! { "is_approved": false, "is_blocked": false },
        StudentStatus::Blocked => doc! { "is_blocked": true },
    }
}

impl StudentDbExt for Database {
    async fn list_students(
        &self,
        page: PageState,
        status: Option<StudentStatus>,
        search: Option<&str>,
    ) -> Result<StudentPage, ServiceError> {
        let mut query = status.map(status_filter).unwrap_or_default();

        if let Some(needle) = search.filter(|s| !s.trim().is_empty()) {
            let expr = doc! { "$regex": needle.trim(), "$options": "i" };
            query.insert(
                "$or",
                vec![doc! { "name": expr.clone() }, doc! { "email": expr }],
            );
        }

        let collection = self.collection::<Student>(STUDENT_COLLECTION_NAME);

        let total = collection.count_documents(query.clone(), None).await?;

        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .skip(page.skip())
            .limit(page.page_length as i64)
            .build();

        let students: Vec<Student> = collection
            .find(query, options)
            .await?
            .try_collect()
            .await?;

        Ok(StudentPage {
            students,
            pagination: Pagination {
                current_page: page.page,
                total_pages: page.total_pages(total),
                total_items: total,
                items_per_page: page.page_length,
            },
        })
    }

    async fn get_student(&self, id: Uuid) -> Result<Student, ServiceError> {
        self.collection::<Student>(STUDENT_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await?
            .ok_or_else(|| ServiceError::not_found(EntityKind::Student, id))
    }

    async fn student_view(&self, id: Uuid) -> Result<StudentView, ServiceError> {
        let student = self.get_student(id).await?;

        let batches: Vec<BatchSummary> = if student.assigned_batches.is_empty() {
            vec![]
        } else {
            self.collection::<BatchSummary>(BATCH_COLLECTION_NAME)
                .find(filter::by_ids(&student.assigned_batches), None)
                .await?
                .try_collect()
                .await?
        };

        let tests: Vec<TestSummary> = if student.assigned_tests.is_empty() {
            vec![]
        } else {
            self.collection::<TestSummary>(TEST_COLLECTION_NAME)
                .find(filter::by_ids(&student.assigned_tests), None)
                .await?
                .try_collect()
                .await?
        };

        let shifts: Vec<ShiftSummary> = if student.assigned_shifts.is_empty() {
            vec![]
        } else {
            self.collection::<ShiftSummary>(SHIFT_COLLECTION_NAME)
                .find(filter::by_ids(&student.assigned_shifts), None)
                .await?
                .try_collect()
                .await?
        };

        Ok(StudentView {
            student,
            batches,
            tests,
            shifts,
        })
    }

    async fn approve_student(&self, id: Uuid) -> Result<Student, ServiceError> {
        set_flags(self, id, doc! { "is_approved": true, "is_blocked": false }).await
    }

    async fn block_student(&self, id: Uuid) -> Result<Student, ServiceError> {
        set_flags(self, id, doc! { "is_blocked": true, "is_approved": false }).await
    }

    async fn unblock_student(&self, id: Uuid) -> Result<Student, ServiceError> {
        set_flags(self, id, doc! { "is_blocked": false }).await
    }

    async fn bulk_approve(&self, ids: &[IdRef]) -> Result<u64, ServiceError> {
        let ids = normalize_required(ids, "student")?;

        let result = self
            .collection::<Student>(STUDENT_COLLECTION_NAME)
            .update_many(
                filter::by_ids(&ids),
                doc! { "$set": {
                    "is_approved": true,
                    "is_blocked": false,
                    "updated_at": now_bson(),
                } },
                None,
            )
            .await?;

        Ok(result.modified_count)
    }

    async fn bulk_block(&self, ids: &[IdRef]) -> Result<u64, ServiceError> {
        let ids = normalize_required(ids, "student")?;

        let result = self
            .collection::<Student>(STUDENT_COLLECTION_NAME)
            .update_many(
                filter::by_ids(&ids),
                doc! { "$set": {
                    "is_blocked": true,
                    "is_approved": false,
                    "updated_at": now_bson(),
                } },
                None,
            )
            .await?;

        Ok(result.modified_count)
    }

    async fn replace_batches(
        &self,
        client: &Client,
        id: Uuid,
        ids: &[IdRef],
    ) -> Result<StudentView, ServiceError> {
        let desired = normalize_replacement(ids, "batch")?;
        membership::replace_members(client, self, id, desired, Relation::StudentBatches).await?;
        self.student_view(id).await
    }

    async fn replace_tests(
        &self,
        client: &Client,
        id: Uuid,
        ids: &[IdRef],
    ) -> Result<StudentView, ServiceError> {
        let desired = normalize_replacement(ids, "test")?;
        membership::replace_members(client, self, id, desired, Relation::StudentTests).await?;
        self.student_view(id).await
    }

    async fn replace_shifts(
        &self,
        client: &Client,
        id: Uuid,
        ids: &[IdRef],
    ) -> Result<StudentView, ServiceError> {
        let desired = normalize_replacement(ids, "shift")?;
        membership::replace_members(client, self, id, desired, Relation::StudentShifts).await?;
        self.student_view(id).await
    }

    async fn assign_shift(
        &self,
        client: &Client,
        student: Uuid,
        shift: Uuid,
    ) -> Result<StudentView, ServiceError> {
        membership::add_members(client, self, student, vec![shift], Relation::StudentShifts)
            .await?;
        self.student_view(student).await
    }

    async fn delete_student(&self, client: &Client, id: Uuid) -> Result<(), ServiceError> {
        membership::delete_student(client, self, id).await
    }

    async fn student_stats(&self) -> Result<StudentStats, ServiceError> {
        let collection = self.collection::<Student>(STUDENT_COLLECTION_NAME);

        let total = collection.count_documents(None, None).await?;
        let approved = collection
            .count_documents(status_filter(StudentStatus::Approved), None)
            .await?;
        let pending = collection
            .count_documents(status_filter(StudentStatus::Pending), None)
            .await?;
        let blocked = collection
            .count_documents(status_filter(StudentStatus::Blocked), None)
            .await?;

        Ok(StudentStats {
            total,
            approved,
            pending,
            blocked,
        })
    }
}

async fn set_flags(
    db: &Database,
    id: Uuid,
    flags: bson::Document,
) -> Result<Student, ServiceError> {
    let mut changes = flags;
    changes.insert("updated_at", now_bson());

    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();

    db.collection::<Student>(STUDENT_COLLECTION_NAME)
        .find_one_and_update(filter::by_id(id), doc! { "$set": changes }, options)
        .await?
        .ok_or_else(|| ServiceError::not_found(EntityKind::Student, id))
}
