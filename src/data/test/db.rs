use std::collections::HashSet;

use bson::doc;
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::{Client, Database};
use rocket::futures::TryStreamExt;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Test, TEST_COLLECTION_NAME};
use crate::data::batch::{Batch, BATCH_COLLECTION_NAME};
use crate::data::membership;
use crate::data::{filter, uuid_bson};
use crate::error::{EntityKind, ServiceError};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TestCreateData {
    pub title: String,
    #[serde(default)]
    pub audio_url: String,
    #[serde(default)]
    pub reference_text: String,
    #[serde(default)]
    pub duration_secs: Option<u32>,
}

pub trait TestDbExt {
    async fn create_test(&self, admin: Uuid, data: TestCreateData) -> Result<Test, ServiceError>;
    async fn list_tests(&self) -> Result<Vec<Test>, ServiceError>;
    async fn get_test(&self, id: Uuid) -> Result<Test, ServiceError>;

    async fn attach_reference_text(&self, id: Uuid, text: String) -> Result<Test, ServiceError>;
    async fn set_test_active(&self, id: Uuid, active: bool) -> Result<Test, ServiceError>;

    async fn delete_test(&self, client: &Client, id: Uuid) -> Result<(), ServiceError>;

    /// Active tests reachable by a batch.
    async fn tests_for_batch(&self, batch: Uuid) -> Result<Vec<Test>, ServiceError>;

    /// Active tests a student can take: everything carried by their
    /// batches plus direct assignments, deduplicated.
    async fn tests_for_student(&self, student: Uuid) -> Result<Vec<Test>, ServiceError>;
}

impl TestDbExt for Database {
    async fn create_test(&self, admin: Uuid, data: TestCreateData) -> Result<Test, ServiceError> {
        if data.title.trim().is_empty() {
            return Err(ServiceError::Validation("test title is required".into()));
        }

        let mut test = Test {
            id: Uuid::new_v4(),
            title: data.title.trim().to_string(),
            audio_url: data.audio_url,
            reference_text: data.reference_text,
            uploaded_by: admin,
            assigned_batches: vec![],
            is_active: true,
            duration_secs: super::DEFAULT_DURATION_SECS,
            created_at: chrono::Utc::now(),
        };
        if let Some(duration) = data.duration_secs {
            test.duration_secs = duration;
        }

        self.collection::<Test>(TEST_COLLECTION_NAME)
            .insert_one(&test, None)
            .await?;

        Ok(test)
    }

    async fn list_tests(&self) -> Result<Vec<Test>, ServiceError> {
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();

        let tests = self
            .collection::<Test>(TEST_COLLECTION_NAME)
            .find(None, options)
            .await?
            .try_collect()
            .await?;

        Ok(tests)
    }

    async fn get_test(&self, id: Uuid) -> Result<Test, ServiceError> {
        self.collection::<Test>(TEST_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await?
            .ok_or_else(|| ServiceError::not_found(EntityKind::Test, id))
    }

    async fn attach_reference_text(&self, id: Uuid, text: String) -> Result<Test, ServiceError> {
        update_test(self, id, doc! { "reference_text": text }).await
    }

    async fn set_test_active(&self, id: Uuid, active: bool) -> Result<Test, ServiceError> {
        update_test(self, id, doc! { "is_active": active }).await
    }

    async fn delete_test(&self, client: &Client, id: Uuid) -> Result<(), ServiceError> {
        membership::delete_test(client, self, id).await
    }

    async fn tests_for_batch(&self, batch: Uuid) -> Result<Vec<Test>, ServiceError> {
        let tests = self
            .collection::<Test>(TEST_COLLECTION_NAME)
            .find(
                doc! {
                    "assigned_batches": uuid_bson(batch),
                    "is_active": true,
                },
                None,
            )
            .await?
            .try_collect()
            .await?;

        Ok(tests)
    }

    async fn tests_for_student(&self, student: Uuid) -> Result<Vec<Test>, ServiceError> {
        let batches: Vec<Batch> = self
            .collection::<Batch>(BATCH_COLLECTION_NAME)
            .find(filter::referencing("students", student), None)
            .await?
            .try_collect()
            .await?;

        let mut reachable: HashSet<Uuid> = batches.iter().flat_map(|b| b.tests.clone()).collect();

        let owner = self
            .collection::<crate::data::student::Student>(
                crate::data::student::STUDENT_COLLECTION_NAME,
            )
            .find_one(filter::by_id(student), None)
            .await?
            .ok_or_else(|| ServiceError::not_found(EntityKind::Student, student))?;
        reachable.extend(owner.assigned_tests);

        if reachable.is_empty() {
            return Ok(vec![]);
        }

        let ids: Vec<Uuid> = reachable.into_iter().collect();
        let mut query = filter::by_ids(&ids);
        query.insert("is_active", true);

        let tests = self
            .collection::<Test>(TEST_COLLECTION_NAME)
            .find(query, None)
            .await?
            .try_collect()
            .await?;

        Ok(tests)
    }
}

async fn update_test(
    db: &Database,
    id: Uuid,
    changes: bson::Document,
) -> Result<Test, ServiceError> {
    let options = FindOneAndUpdateOptions::builder()
        .return_document(ReturnDocument::After)
        .build();

    db.collection::<Test>(TEST_COLLECTION_NAME)
        .find_one_and_update(filter::by_id(id), doc! { "$set": changes }, options)
        .await?
        .ok_or_else(|| ServiceError::not_found(EntityKind::Test, id))
}
