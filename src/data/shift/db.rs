use bson::doc;
use chrono::{DateTime, Utc};
use mongodb::options::FindOptions;
use mongodb::{Client, Database};
use rocket::futures::TryStreamExt;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Shift, SHIFT_COLLECTION_NAME};
use crate::data::filter;
use crate::data::membership;
use crate::data::test::db::TestDbExt;
use crate::error::{EntityKind, ServiceError};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ShiftCreateData {
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: u32,
    #[serde(default)]
    pub test: Option<Uuid>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

pub trait ShiftDbExt {
    async fn create_shift(&self, data: ShiftCreateData) -> Result<Shift, ServiceError>;
    async fn list_shifts(&self) -> Result<Vec<Shift>, ServiceError>;
    async fn get_shift(&self, id: Uuid) -> Result<Shift, ServiceError>;
    async fn delete_shift(&self, client: &Client, id: Uuid) -> Result<(), ServiceError>;
}

impl ShiftDbExt for Database {
    async fn create_shift(&self, data: ShiftCreateData) -> Result<Shift, ServiceError> {
        if data.name.trim().is_empty() {
            return Err(ServiceError::Validation("shift name is required".into()));
        }

        // A dangling test reference would make the shift unusable.
        if let Some(test) = data.test {
            self.get_test(test).await?;
        }

        let shift = Shift {
            id: Uuid::new_v4(),
            name: data.name.trim().to_string(),
            start_time: data.start_time,
            duration_minutes: data.duration_minutes,
            students: vec![],
            test: data.test,
            date: data.date,
        };

        self.collection::<Shift>(SHIFT_COLLECTION_NAME)
            .insert_one(&shift, None)
            .await?;

        Ok(shift)
    }

    async fn list_shifts(&self) -> Result<Vec<Shift>, ServiceError> {
        let options = FindOptions::builder().sort(doc! { "start_time": 1 }).build();

        let shifts = self
            .collection::<Shift>(SHIFT_COLLECTION_NAME)
            .find(None, options)
            .await?
            .try_collect()
            .await?;

        Ok(shifts)
    }

    async fn get_shift(&self, id: Uuid) -> Result<Shift, ServiceError> {
        self.collection::<Shift>(SHIFT_COLLECTION_NAME)
            .find_one(filter::by_id(id), None)
            .await?
            .ok_or_else(|| ServiceError::not_found(EntityKind::Shift, id))
    }

    async fn delete_shift(&self, client: &Client, id: Uuid) -> Result<(), ServiceError> {
        membership::delete_shift(client, self, id).await
    }
}
