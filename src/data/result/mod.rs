use chrono::{DateTime, Utc};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::EntityKind;

pub mod db;

pub static RESULT_COLLECTION_NAME: &str = EntityKind::TestResult.collection_name();

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Mistake {
    pub word: String,
    pub expected: String,
    pub typed: String,
}

/// The outcome of one test sitting. Immutable once submitted.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TestResult {
    #[serde(default = "Uuid::new_v4", rename = "_id")]
    pub id: Uuid,
    pub student: Uuid,
    #[serde(default)]
    pub shift: Option<Uuid>,
    pub test: Uuid,

    pub wpm: f64,
    pub accuracy: f64,
    #[serde(default)]
    pub mistakes: Vec<Mistake>,

    #[serde(default = "Utc::now")]
    pub submitted_at: DateTime<Utc>,
}
