use chrono::{DateTime, Utc};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::EntityKind;

pub mod db;

pub static SHIFT_COLLECTION_NAME: &str = EntityKind::Shift.collection_name();

/// A scheduled sitting of a test.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Shift {
    #[serde(default = "Uuid::new_v4", rename = "_id")]
    pub id: Uuid,
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: u32,

    #[serde(default)]
    pub students: Vec<Uuid>,
    #[serde(default)]
    pub test: Option<Uuid>,

    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShiftSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
}
