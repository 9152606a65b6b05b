use std::collections::HashMap;

use bson::doc;
use chrono::{DateTime, Utc};
use mongodb::options::{FindOneAndUpdateOptions, FindOptions, ReturnDocument};
use mongodb::{Client, Database};
use rocket::futures::{FutureExt, TryStreamExt};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Batch, BatchView, BATCH_COLLECTION_NAME, DEFAULT_MAX_STUDENTS};
use crate::data::admin::{AdminSummary, ADMIN_COLLECTION_NAME};
use crate::data::id::{normalize_ids, normalize_required, IdRef};
use crate::data::membership::{self, Relation};
use crate::data::student::{StudentSummary, STUDENT_COLLECTION_NAME};
use crate::data::test::{TestSummary, TEST_COLLECTION_NAME};
use crate::data::{filter, now_bson, txn, uuid_bson};
use crate::error::{EntityKind, ServiceError};
use crate::middleware::paging::PageState;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BatchCreateData {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub max_students: Option<u32>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,

    /// Initial rosters; applied through the synchronizer so back
    /// references land together with the new batch.
    #[serde(default)]
    #[schema(value_type = Vec<String>)]
    pub students: Vec<IdRef>,
    #[serde(default)]
    #[schema(value_type = Vec<String>)]
    pub tests: Vec<IdRef>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct BatchUpdateData {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub max_students: Option<u32>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u64,
    pub total_items: u64,
    pub items_per_page: u32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchPage {
    pub batches: Vec<BatchView>,
    pub pagination: Pagination,
}

pub trait BatchDbExt {
    async fn create_batch(
        &self,
        client: &Client,
        admin: Uuid,
        data: BatchCreateData,
    ) -> Result<BatchView, ServiceError>;

    async fn list_batches(
        &self,
        page: PageState,
        is_active: Option<bool>,
        created_by: Option<Uuid>,
    ) -> Result<BatchPage, ServiceError>;

    async fn get_batch(&self, id: Uuid) -> Result<Batch, ServiceError>;
    async fn batch_view(&self, id: Uuid) -> Result<BatchView, ServiceError>;

    async fn update_batch(&self, id: Uuid, data: BatchUpdateData)
        -> Result<BatchView, ServiceError>;

    async fn delete_batch(&self, client: &Client, id: Uuid) -> Result<(), ServiceError>;

    async fn assign_students(
        &self,
        client: &Client,
        batch: Uuid,
        ids: &[IdRef],
    ) -> Result<BatchView, ServiceError>;

    async fn remove_students(
        &self,
        client: &Client,
        batch: Uuid,
        ids: &[IdRef],
    ) -> Result<BatchView, ServiceError>;

    async fn assign_tests(
        &self,
        client: &Client,
        batch: Uuid,
        ids: &[IdRef],
    ) -> Result<BatchView, ServiceError>;

    async fn remove_tests(
        &self,
        client: &Client,
        batch: Uuid,
        ids: &[IdRef],
    ) -> Result<BatchView, ServiceError>;

    async fn batches_for_student(&self, student: Uuid) -> Result<Vec<BatchView>, ServiceError>;
    async fn batches_for_admin(&self, admin: Uuid) -> Result<Vec<BatchView>, ServiceError>;

    async fn load_batch_views(&self, batches: Vec<Batch>)
        -> Result<Vec<BatchView>, ServiceError>;
}

impl BatchDbExt for Database {
    async fn create_batch(
        &self,
        client: &Client,
        admin: Uuid,
        data: BatchCreateData,
    ) -> Result<BatchView, ServiceError> {
        if data.name.trim().is_empty() {
            return Err(ServiceError::Validation("batch name is required".into()));
        }

        let existing = self
            .collection::<Batch>(BATCH_COLLECTION_NAME)
            .count_documents(doc! { "name": data.name.trim() }, None)
            .await?;
        if existing > 0 {
            return Err(ServiceError::Conflict(format!(
                "batch with name '{}' already exists",
                data.name.trim()
            )));
        }

        let students = normalize_ids(&data.students);
        let tests = normalize_ids(&data.tests);

        let now = Utc::now();
        let batch = Batch {
            id: Uuid::new_v4(),
            name: data.name.trim().to_string(),
            description: data.description,
            created_by: admin,
            students: vec![],
            tests: vec![],
            is_active: true,
            max_students: data.max_students.unwrap_or(DEFAULT_MAX_STUDENTS),
            start_date: data.start_date,
            end_date: data.end_date,
            created_at: now,
            updated_at: now,
        };

        let batch_id = batch.id;
        txn::with_transaction(client, |session| {
            let db = self.clone();
            let batch = batch.clone();
            let students = students.clone();
            let tests = tests.clone();

            async move {
                db.collection::<Batch>(BATCH_COLLECTION_NAME)
                    .insert_one_with_session(&batch, None, session)
                    .await?;

                if !students.is_empty() {
                    membership::add_members_in_session(
                        &db,
                        session,
                        batch.id,
                        students,
                        Relation::BatchStudents,
                    )
                    .await?;
                }

                if !tests.is_empty() {
                    membership::add_members_in_session(
                        &db,
                        session,
                        batch.id,
                        tests,
                        Relation::BatchTests,
                    )
                    .await?;
                }

                Ok(())
            }
            .boxed()
        })
        .await?;

        self.batch_view(batch_id).await
    }

    async fn list_batches(
        &self,
        page: PageState,
        is_active: Option<bool>,
        created_by: Option<Uuid>,
    ) -> Result<BatchPage, ServiceError> {
        let mut query = doc! {};
        if let Some(active) = is_active {
            query.insert("is_active", active);
        }
        if let Some(admin) = created_by {
            query.insert("created_by", uuid_bson(admin));
        }

        let collection = self.collection::<Batch>(BATCH_COLLECTION_NAME);

        let total = collection.count_documents(query.clone(), None).await?;

        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .skip(page.skip())
            .limit(page.page_length as i64)
            .build();

        let batches: Vec<Batch> = collection
            .find(query, options)
            .await?
            .try_collect()
            .await?;

        Ok(BatchPage {
            batches: self.load_batch_views(batches).await?,
            pagination: Pagination {
                current_page: page.page,
                total_pages: page.total_pages(total),
                total_items: total,
                items_per_page: page.page_length,
            },
        })
    }

    async fn get_batch(&self, id: Uuid) -> Result<Batch, ServiceError> {
        self.collection::<Batch>(BATCH_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await?
            .ok_or_else(|| ServiceError::not_found(EntityKind::Batch, id))
    }

    async fn batch_view(&self, id: Uuid) -> Result<BatchView, ServiceError> {
        let batch = self.get_batch(id).await?;

        let mut views = self.load_batch_views(vec![batch]).await?;
        Ok(views.remove(0))
    }

    async fn update_batch(
        &self,
        id: Uuid,
        data: BatchUpdateData,
    ) -> Result<BatchView, ServiceError> {
        if let Some(name) = data.name.as_deref() {
            if name.trim().is_empty() {
                return Err(ServiceError::Validation("batch name is required".into()));
            }

            let taken = self
                .collection::<Batch>(BATCH_COLLECTION_NAME)
                .count_documents(
                    doc! { "name": name.trim(), "_id": { "$ne": uuid_bson(id) } },
                    None,
                )
                .await?;
            if taken > 0 {
                return Err(ServiceError::Conflict(format!(
                    "batch with name '{}' already exists",
                    name.trim()
                )));
            }
        }

        let mut changes = doc! { "updated_at": now_bson() };
        if let Some(name) = data.name {
            changes.insert("name", name.trim());
        }
        if let Some(description) = data.description {
            changes.insert("description", description);
        }
        if let Some(max_students) = data.max_students {
            changes.insert("max_students", max_students);
        }
        if let Some(start_date) = data.start_date {
            changes.insert("start_date", bson::to_bson(&start_date)?);
        }
        if let Some(end_date) = data.end_date {
            changes.insert("end_date", bson::to_bson(&end_date)?);
        }
        if let Some(is_active) = data.is_active {
            changes.insert("is_active", is_active);
        }

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        let updated = self
            .collection::<Batch>(BATCH_COLLECTION_NAME)
            .find_one_and_update(filter::by_id(id), doc! { "$set": changes }, options)
            .await?
            .ok_or_else(|| ServiceError::not_found(EntityKind::Batch, id))?;

        let mut views = self.load_batch_views(vec![updated]).await?;
        Ok(views.remove(0))
    }

    async fn delete_batch(&self, client: &Client, id: Uuid) -> Result<(), ServiceError> {
        membership::delete_batch(client, self, id).await
    }

    async fn assign_students(
        &self,
        client: &Client,
        batch: Uuid,
        ids: &[IdRef],
    ) -> Result<BatchView, ServiceError> {
        let ids = normalize_required(ids, "student")?;
        membership::add_members(client, self, batch, ids, Relation::BatchStudents).await?;
        self.batch_view(batch).await
    }

    async fn remove_students(
        &self,
        client: &Client,
        batch: Uuid,
        ids: &[IdRef],
    ) -> Result<BatchView, ServiceError> {
        let ids = normalize_required(ids, "student")?;
        membership::remove_members(client, self, batch, ids, Relation::BatchStudents).await?;
        self.batch_view(batch).await
    }

    async fn assign_tests(
        &self,
        client: &Client,
        batch: Uuid,
        ids: &[IdRef],
    ) -> Result<BatchView, ServiceError> {
        let ids = normalize_required(ids, "test")?;
        membership::add_members(client, self, batch, ids, Relation::BatchTests).await?;
        self.batch_view(batch).await
    }

    async fn remove_tests(
        &self,
        client: &Client,
        batch: Uuid,
        ids: &[IdRef],
    ) -> Result<BatchView, ServiceError> {
        let ids = normalize_required(ids, "test")?;
        membership::remove_members(client, self, batch, ids, Relation::BatchTests).await?;
        self.batch_view(batch).await
    }

    async fn batches_for_student(&self, student: Uuid) -> Result<Vec<BatchView>, ServiceError> {
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();

        let batches: Vec<Batch> = self
            .collection::<Batch>(BATCH_COLLECTION_NAME)
            .find(filter::referencing("students", student), options)
            .await?
            .try_collect()
            .await?;

        self.load_batch_views(batches).await
    }

    async fn batches_for_admin(&self, admin: Uuid) -> Result<Vec<BatchView>, ServiceError> {
        let options = FindOptions::builder().sort(doc! { "created_at": -1 }).build();

        let batches: Vec<Batch> = self
            .collection::<Batch>(BATCH_COLLECTION_NAME)
            .find(doc! { "created_by": uuid_bson(admin) }, options)
            .await?
            .try_collect()
            .await?;

        self.load_batch_views(batches).await
    }

    /// Populates shallow summaries for a page of batches with one query
    /// per related collection.
    async fn load_batch_views(
        &self,
        batches: Vec<Batch>,
    ) -> Result<Vec<BatchView>, ServiceError> {
        let student_ids: Vec<Uuid> = batches.iter().flat_map(|b| b.students.clone()).collect();
        let test_ids: Vec<Uuid> = batches.iter().flat_map(|b| b.tests.clone()).collect();
        let admin_ids: Vec<Uuid> = batches.iter().map(|b| b.created_by).collect();

        let students = summaries_by_id::<StudentSummary>(
            self,
            STUDENT_COLLECTION_NAME,
            &student_ids,
            |s| s.id,
        )
        .await?;
        let tests =
            summaries_by_id::<TestSummary>(self, TEST_COLLECTION_NAME, &test_ids, |t| t.id)
                .await?;
        let admins =
            summaries_by_id::<AdminSummary>(self, ADMIN_COLLECTION_NAME, &admin_ids, |a| a.id)
                .await?;

        Ok(batches
            .into_iter()
            .map(|batch| BatchView {
                created_by: admins.get(&batch.created_by).cloned(),
                students: batch
                    .students
                    .iter()
                    .filter_map(|id| students.get(id).cloned())
                    .collect(),
                tests: batch
                    .tests
                    .iter()
                    .filter_map(|id| tests.get(id).cloned())
                    .collect(),
                batch,
            })
            .collect())
    }
}

async fn summaries_by_id<T>(
    db: &Database,
    collection: &str,
    ids: &[Uuid],
    key: impl Fn(&T) -> Uuid,
) -> Result<HashMap<Uuid, T>, ServiceError>
where
    T: serde::de::DeserializeOwned + Unpin + Send + Sync,
{
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let found: Vec<T> = db
        .collection::<T>(collection)
        .find(filter::by_ids(ids), None)
        .await?
        .try_collect()
        .await?;

    Ok(found.into_iter().map(|item| (key(&item), item)).collect())
}
