use chrono::{DateTime, Utc};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::EntityKind;

pub mod db;

pub static TEST_COLLECTION_NAME: &str = EntityKind::Test.collection_name();

pub const DEFAULT_DURATION_SECS: u32 = 300;

fn true_bool() -> bool {
    true
}

fn default_duration() -> u32 {
    DEFAULT_DURATION_SECS
}

/// A typing test: an audio dictation with the text students are expected
/// to reproduce.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Test {
    #[serde(default = "Uuid::new_v4", rename = "_id")]
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub audio_url: String,
    #[serde(default)]
    pub reference_text: String,
    pub uploaded_by: Uuid,

    #[serde(default)]
    pub assigned_batches: Vec<Uuid>,

    #[serde(default = "true_bool")]
    pub is_active: bool,
    #[serde(default = "default_duration")]
    pub duration_secs: u32,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TestSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    pub title: String,
    #[serde(default = "default_duration")]
    pub duration_secs: u32,
}
