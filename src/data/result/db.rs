use bson::{doc, Document};
use mongodb::options::FindOptions;
use mongodb::{Client, Database};
use rocket::futures::{FutureExt, TryStreamExt};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Mistake, TestResult, RESULT_COLLECTION_NAME};
use crate::data::shift::SHIFT_COLLECTION_NAME;
use crate::data::student::STUDENT_COLLECTION_NAME;
use crate::data::test::TEST_COLLECTION_NAME;
use crate::data::{filter, now_bson, txn, uuid_bson};
use crate::error::{EntityKind, ServiceError};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ResultSubmitData {
    pub test: Uuid,
    #[serde(default)]
    pub shift: Option<Uuid>,
    pub wpm: f64,
    pub accuracy: f64,
    #[serde(default)]
    pub mistakes: Vec<Mistake>,
}

pub trait ResultDbExt {
    /// Stores the submitted result and appends it to the student's
    /// history in one transaction; the result never exists without the
    /// student's list pointing at it.
    async fn submit_result(
        &self,
        client: &Client,
        student: Uuid,
        data: ResultSubmitData,
    ) -> Result<TestResult, ServiceError>;

    async fn results_for_shift(&self, shift: Uuid) -> Result<Vec<TestResult>, ServiceError>;
    async fn results_for_student(&self, student: Uuid) -> Result<Vec<TestResult>, ServiceError>;
}

impl ResultDbExt for Database {
    async fn submit_result(
        &self,
        client: &Client,
        student: Uuid,
        data: ResultSubmitData,
    ) -> Result<TestResult, ServiceError> {
        if !(0.0..=100.0).contains(&data.accuracy) {
            return Err(ServiceError::Validation(
                "accuracy must be between 0 and 100".into(),
            ));
        }
        if data.wpm < 0.0 {
            return Err(ServiceError::Validation("wpm must not be negative".into()));
        }

        let result = TestResult {
            id: Uuid::new_v4(),
            student,
            shift: data.shift,
            test: data.test,
            wpm: data.wpm,
            accuracy: data.accuracy,
            mistakes: data.mistakes,
            submitted_at: chrono::Utc::now(),
        };

        txn::with_transaction(client, |session| {
            let db = self.clone();
            let result = result.clone();

            async move {
                let students = db.collection::<Document>(STUDENT_COLLECTION_NAME);

                students
                    .find_one_with_session(filter::by_id(result.student), None, session)
                    .await?
                    .ok_or_else(|| ServiceError::not_found(EntityKind::Student, result.student))?;

                db.collection::<Document>(TEST_COLLECTION_NAME)
                    .find_one_with_session(filter::by_id(result.test), None, session)
                    .await?
                    .ok_or_else(|| ServiceError::not_found(EntityKind::Test, result.test))?;

                if let Some(shift) = result.shift {
                    db.collection::<Document>(SHIFT_COLLECTION_NAME)
                        .find_one_with_session(filter::by_id(shift), None, session)
                        .await?
                        .ok_or_else(|| ServiceError::not_found(EntityKind::Shift, shift))?;
                }

                db.collection::<TestResult>(RESULT_COLLECTION_NAME)
                    .insert_one_with_session(&result, None, session)
                    .await?;

                students
                    .update_one_with_session(
                        filter::by_id(result.student),
                        doc! {
                            "$addToSet": { "results": uuid_bson(result.id) },
                            "$set": { "updated_at": now_bson() },
                        },
                        None,
                        session,
                    )
                    .await?;

                Ok(())
            }
            .boxed()
        })
        .await?;

        Ok(result)
    }

    async fn results_for_shift(&self, shift: Uuid) -> Result<Vec<TestResult>, ServiceError> {
        let options = FindOptions::builder()
            .sort(doc! { "submitted_at": -1 })
            .build();

        let results = self
            .collection::<TestResult>(RESULT_COLLECTION_NAME)
            .find(doc! { "shift": uuid_bson(shift) }, options)
            .await?
            .try_collect()
            .await?;

        Ok(results)
    }

    async fn results_for_student(&self, student: Uuid) -> Result<Vec<TestResult>, ServiceError> {
        let options = FindOptions::builder()
            .sort(doc! { "submitted_at": -1 })
            .build();

        let results = self
            .collection::<TestResult>(RESULT_COLLECTION_NAME)
            .find(doc! { "student": uuid_bson(student) }, options)
            .await?
            .try_collect()
            .await?;

        Ok(results)
    }
}
