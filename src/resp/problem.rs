use std::io::Cursor;

use rocket::http::hyper::header::CONTENT_LANGUAGE;
use rocket::http::ContentType;
use rocket::http::Status;
use rocket::response::Responder;
use rocket::{response, Request, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::{Display, Formatter};
use utoipa::ToSchema;

use crate::error::ServiceError;

/// Implements [RFC7807](https://tools.ietf.org/html/rfc7807).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Problem {
    #[serde(skip)]
    pub status: Status,
    pub type_uri: String,
    pub title: String,

    pub detail: Option<String>,
    pub instance_uri: Option<String>,

    pub body: Map<String, Value>,
}

impl Default for Problem {
    fn default() -> Self {
        Problem {
            status: Status::InternalServerError,
            type_uri: "about:blank".to_string(),
            title: "Problem".to_string(),
            detail: None,
            instance_uri: None,
            body: Map::new(),
        }
    }
}

impl Problem {
    pub fn new(status: Status, type_uri: impl ToString, title: impl ToString) -> Problem {
        Problem {
            status,
            type_uri: type_uri.to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn new_untyped(status: Status, title: impl ToString) -> Problem {
        Problem {
            status,
            type_uri: "about:blank".to_string(),
            title: title.to_string(),
            ..Default::default()
        }
    }

    pub fn detail(&mut self, value: impl ToString) -> &mut Problem {
        self.detail = Some(value.to_string());
        self
    }

    pub fn instance_uri(&mut self, value: String) -> &mut Problem {
        self.instance_uri = Some(value);
        self
    }

    pub fn insert<V: Serialize>(&mut self, key: impl ToString, value: V) -> &mut Problem {
        self.body.insert(
            key.to_string(),
            serde_json::to_value(value).expect("data must be JSON serializable"),
        );
        self
    }

    pub fn insert_str(&mut self, key: impl ToString, value: impl ToString) -> &mut Problem {
        self.body
            .insert(key.to_string(), Value::String(value.to_string()));
        self
    }
}

impl Display for Problem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.status, self.title)
    }
}

impl std::error::Error for Problem {}

impl<'r> Responder<'r, 'static> for Problem {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let mut body = self.body.clone();

        // Following are required by rfc7807
        body.insert(String::from("type"), serde_json::Value::from(self.type_uri));
        body.insert(String::from("title"), serde_json::Value::from(self.title));

        // Optional parameters as specified by rfc7807
        if self.detail.is_some() {
            body.insert(
                String::from("detail"),
                serde_json::Value::from(self.detail.unwrap()),
            );
        }
        body.insert(
            String::from("status"),
            serde_json::Value::from(self.status.code),
        );
        if self.instance_uri.is_some() {
            body.insert(
                String::from("instance"),
                serde_json::Value::from(self.instance_uri.unwrap()),
            );
        }

        let body_string = serde_json::to_string(&body)
            .expect("JSON map keys and values must be JSON serializable");

        Response::build()
            .status(self.status)
            .header(ContentType::new("application", "problem+json"))
            .raw_header(CONTENT_LANGUAGE.as_str(), "en")
            .sized_body(body_string.len(), Cursor::new(body_string))
            .ok()
    }
}

/// Service errors cross the HTTP boundary as problem documents carrying a
/// stable `kind` tag; storage error internals never leak past the log.
impl From<ServiceError> for Problem {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Validation(_) => Problem::new_untyped(Status::BadRequest, &e)
                .insert_str("kind", "validation")
                .clone(),
            ServiceError::NotFound { kind, ref missing } => {
                Problem::new_untyped(Status::NotFound, format!("Referenced {} missing.", kind))
                    .detail(&e)
                    .insert(
                        "missing",
                        missing.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    )
                    .insert_str("kind", "not_found")
                    .clone()
            }
            ServiceError::Eligibility { student } => {
                Problem::new_untyped(Status::Conflict, "Student is not eligible for assignment.")
                    .detail(&e)
                    .insert_str("student", student)
                    .insert_str("kind", "eligibility")
                    .clone()
            }
            ServiceError::Capacity {
                batch,
                max_students,
            } => Problem::new_untyped(Status::Conflict, "Batch capacity exceeded.")
                .detail(&e)
                .insert_str("batch", batch)
                .insert("max_students", max_students)
                .insert_str("kind", "capacity")
                .clone(),
            ServiceError::Conflict(_) => Problem::new_untyped(Status::Conflict, &e)
                .insert_str("kind", "conflict")
                .clone(),
            ServiceError::Transient(ref source) => {
                tracing::warn!("transient storage failure: {}", source);
                Problem::new_untyped(
                    Status::ServiceUnavailable,
                    "Storage temporarily unavailable, retry the request.",
                )
                .insert_str("kind", "transient")
                .clone()
            }
            ServiceError::Storage(ref source) => {
                tracing::error!("storage failure: {}", source);
                Problem::new_untyped(
                    Status::InternalServerError,
                    "Storage failed while processing request.",
                )
                .insert_str("kind", "storage")
                .clone()
            }
        }
    }
}

impl From<mongodb::error::Error> for Problem {
    fn from(e: mongodb::error::Error) -> Self {
        Problem::from(ServiceError::from(e))
    }
}

impl From<bson::de::Error> for Problem {
    fn from(_: bson::de::Error) -> Self {
        Problem::new_untyped(
            Status::InternalServerError,
            "An error occurred while processing BSON data.",
        )
    }
}

impl From<serde_json::Error> for Problem {
    fn from(_: serde_json::Error) -> Self {
        Problem::new_untyped(
            Status::InternalServerError,
            "An error occurred while processing JSON data.",
        )
    }
}

impl From<jsonwebtoken::errors::Error> for Problem {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match e.into_kind() {
            ErrorKind::ExpiredSignature => {
                Problem::new_untyped(Status::Unauthorized, "Expired JWT signature.")
            }
            _ => Problem::new_untyped(Status::Unauthorized, "Error while handling JWT."),
        }
    }
}

impl From<std::io::Error> for Problem {
    fn from(_: std::io::Error) -> Self {
        Problem::new_untyped(Status::InternalServerError, "Server IO error")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EntityKind;
    use uuid::Uuid;

    #[test]
    fn not_found_problem_carries_the_missing_ids() {
        let missing = vec![Uuid::new_v4(), Uuid::new_v4()];
        let problem = Problem::from(ServiceError::NotFound {
            kind: EntityKind::Test,
            missing: missing.clone(),
        });

        assert_eq!(problem.status, Status::NotFound);
        assert_eq!(problem.body["kind"], "not_found");

        let listed: Vec<String> = serde_json::from_value(problem.body["missing"].clone()).unwrap();
        assert_eq!(listed, vec![missing[0].to_string(), missing[1].to_string()]);
    }

    #[test]
    fn kinds_map_onto_stable_statuses() {
        let cases = [
            (
                Problem::from(ServiceError::Validation("bad".into())),
                Status::BadRequest,
            ),
            (
                Problem::from(ServiceError::Eligibility {
                    student: Uuid::new_v4(),
                }),
                Status::Conflict,
            ),
            (
                Problem::from(ServiceError::Capacity {
                    batch: Uuid::new_v4(),
                    max_students: 50,
                }),
                Status::Conflict,
            ),
            (
                Problem::from(ServiceError::Conflict("duplicate batch name".into())),
                Status::Conflict,
            ),
        ];

        for (problem, status) in cases {
            assert_eq!(problem.status, status);
        }
    }
}
