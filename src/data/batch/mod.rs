use chrono::{DateTime, Utc};
use utoipa::ToSchema;
use uuid::Uuid;

use super::admin::AdminSummary;
use super::student::StudentSummary;
use super::test::TestSummary;
use crate::error::EntityKind;

pub mod db;

pub static BATCH_COLLECTION_NAME: &str = EntityKind::Batch.collection_name();

pub const DEFAULT_MAX_STUDENTS: u32 = 50;

fn true_bool() -> bool {
    true
}

fn default_max_students() -> u32 {
    DEFAULT_MAX_STUDENTS
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Batch {
    #[serde(default = "Uuid::new_v4", rename = "_id")]
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_by: Uuid,

    #[serde(default)]
    pub students: Vec<Uuid>,
    #[serde(default)]
    pub tests: Vec<Uuid>,

    #[serde(default = "true_bool")]
    pub is_active: bool,
    #[serde(default = "default_max_students")]
    pub max_students: u32,

    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BatchSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub name: String,
}

/// A batch with its relations populated shallowly, the shape every batch
/// operation responds with.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BatchView {
    pub batch: Batch,
    pub created_by: Option<AdminSummary>,
    pub students: Vec<StudentSummary>,
    pub tests: Vec<TestSummary>,
}
