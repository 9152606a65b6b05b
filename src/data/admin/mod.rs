use chrono::{DateTime, Utc};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::EntityKind;
use crate::role::Role;

pub static ADMIN_COLLECTION_NAME: &str = EntityKind::Admin.collection_name();

fn true_bool() -> bool {
    true
}

fn admin_role() -> Role {
    Role::Admin
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Admin {
    #[serde(default = "Uuid::new_v4", rename = "_id")]
    pub id: Uuid,
    pub subject_id: String,
    #[serde(default)]
    pub name: String,
    pub email: String,

    #[serde(default = "admin_role")]
    pub role: Role,
    #[serde(default = "true_bool")]
    pub is_active: bool,

    #[serde(default)]
    pub last_login: Option<DateTime<Utc>>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Admin {
    pub fn new(subject_id: impl ToString, email: impl ToString, name: impl ToString) -> Admin {
        let now = Utc::now();

        Admin {
            id: Uuid::new_v4(),
            subject_id: subject_id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            role: Role::Admin,
            is_active: true,
            last_login: Some(now),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdminSummary {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    pub email: String,
}
