use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("configuration file not found in '{0}'")]
    NotFound(PathBuf),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    // External errors
    #[error(transparent)]
    Database(#[from] mongodb::error::Error),
    #[error(transparent)]
    Bson(#[from] bson::de::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
}

/// Entity kinds stored as top-level collections.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Student,
    Admin,
    Batch,
    Test,
    Shift,
    TestResult,
}

impl EntityKind {
    pub const fn collection_name(self) -> &'static str {
        match self {
            EntityKind::Student => "students",
            EntityKind::Admin => "admins",
            EntityKind::Batch => "batches",
            EntityKind::Test => "tests",
            EntityKind::Shift => "shifts",
            EntityKind::TestResult => "results",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Student => write!(f, "student"),
            EntityKind::Admin => write!(f, "admin"),
            EntityKind::Batch => write!(f, "batch"),
            EntityKind::Test => write!(f, "test"),
            EntityKind::Shift => write!(f, "shift"),
            EntityKind::TestResult => write!(f, "result"),
        }
    }
}

fn join_ids(ids: &[Uuid]) -> String {
    ids.iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors raised by the membership synchronizer, the guards and the
/// service facade. Routes translate these into problem responses without
/// exposing driver error shapes.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("unknown {kind} id(s): {}", join_ids(.missing))]
    NotFound {
        kind: EntityKind,
        missing: Vec<Uuid>,
    },

    #[error("student {student} is not approved or is blocked")]
    Eligibility { student: Uuid },

    #[error("batch {batch} capacity exceeded, maximum {max_students} students allowed")]
    Capacity { batch: Uuid, max_students: u32 },

    #[error("{0}")]
    Conflict(String),

    #[error("storage temporarily unavailable")]
    Transient(#[source] mongodb::error::Error),

    #[error("storage operation failed")]
    Storage(#[source] mongodb::error::Error),
}

impl ServiceError {
    pub fn not_found(kind: EntityKind, id: Uuid) -> ServiceError {
        ServiceError::NotFound {
            kind,
            missing: vec![id],
        }
    }

    /// Nothing was committed when one of these surfaces; the caller may
    /// simply re-issue the operation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Transient(_))
    }
}

impl From<mongodb::error::Error> for ServiceError {
    fn from(e: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;

        let transient = e.contains_label(mongodb::error::TRANSIENT_TRANSACTION_ERROR)
            || e.contains_label(mongodb::error::UNKNOWN_TRANSACTION_COMMIT_RESULT)
            || matches!(
                e.kind.as_ref(),
                ErrorKind::Io(_)
                    | ErrorKind::ServerSelection { .. }
                    | ErrorKind::ConnectionPoolCleared { .. }
            );

        if transient {
            ServiceError::Transient(e)
        } else {
            ServiceError::Storage(e)
        }
    }
}

impl From<bson::de::Error> for ServiceError {
    fn from(e: bson::de::Error) -> Self {
        ServiceError::Storage(mongodb::error::Error::from(e))
    }
}

impl From<bson::ser::Error> for ServiceError {
    fn from(e: bson::ser::Error) -> Self {
        ServiceError::Storage(mongodb::error::Error::from(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_lists_every_missing_id() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let err = ServiceError::NotFound {
            kind: EntityKind::Batch,
            missing: vec![a, b],
        };

        let msg = err.to_string();
        assert!(msg.contains(&a.to_string()));
        assert!(msg.contains(&b.to_string()));
        assert!(msg.contains("batch"));
    }

    #[test]
    fn only_transient_errors_are_retryable() {
        let err = ServiceError::Validation("empty id list".into());
        assert!(!err.is_retryable());
    }
}
