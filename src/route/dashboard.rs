use bson::doc;
use mongodb::Database;
use rocket::futures::TryStreamExt;
use rocket::serde::json::Json;
use rocket::State;
use utoipa::ToSchema;

use crate::data::result::{TestResult, RESULT_COLLECTION_NAME};
use crate::data::shift::{Shift, SHIFT_COLLECTION_NAME};
use crate::data::student::{Student, STUDENT_COLLECTION_NAME};
use crate::data::test::{Test, TEST_COLLECTION_NAME};
use crate::data::{filter, uuid_bson};
use crate::error::ServiceError;
use crate::resp::jwt::{auth_problem, UserRoleToken};
use crate::resp::problem::Problem;
use crate::role::Role;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ShiftOccupancy {
    pub name: String,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TestPerformance {
    pub test_title: String,
    pub average_wpm: f64,
    pub average_accuracy: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_students: u64,
    pub approved_students: u64,
    pub blocked_students: u64,
    pub online_students: u64,
    pub offline_students: u64,
    pub shifts: Vec<ShiftOccupancy>,
    pub test_performance: Vec<TestPerformance>,
}

/// Read-only aggregate counters for the admin dashboard.
#[utoipa::path(
    responses((status = 200, description = "Aggregate statistics", body = DashboardStats)),
    security(("jwt" = []))
)]
#[get("/dashboard")]
#[tracing::instrument]
pub async fn dashboard_stats(
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<DashboardStats>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    let students = db.collection::<Student>(STUDENT_COLLECTION_NAME);

    let total_students = students
        .count_documents(None, None)
        .await
        .map_err(ServiceError::from)?;
    let approved_students = students
        .count_documents(doc! { "is_approved": true }, None)
        .await
        .map_err(ServiceError::from)?;
    let blocked_students = students
        .count_documents(doc! { "is_blocked": true }, None)
        .await
        .map_err(ServiceError::from)?;
    let online_students = students
        .count_documents(doc! { "is_online_mode": true }, None)
        .await
        .map_err(ServiceError::from)?;
    let offline_students = students
        .count_documents(doc! { "is_online_mode": false }, None)
        .await
        .map_err(ServiceError::from)?;

    let all_shifts: Vec<Shift> = db
        .collection::<Shift>(SHIFT_COLLECTION_NAME)
        .find(None, None)
        .await
        .map_err(ServiceError::from)?
        .try_collect()
        .await
        .map_err(ServiceError::from)?;

    let mut shifts = Vec::with_capacity(all_shifts.len());
    for shift in all_shifts {
        let count = students
            .count_documents(filter::referencing("assigned_shifts", shift.id), None)
            .await
            .map_err(ServiceError::from)?;
        shifts.push(ShiftOccupancy {
            name: shift.name,
            count,
        });
    }

    let all_tests: Vec<Test> = db
        .collection::<Test>(TEST_COLLECTION_NAME)
        .find(None, None)
        .await
        .map_err(ServiceError::from)?
        .try_collect()
        .await
        .map_err(ServiceError::from)?;

    let mut test_performance = Vec::with_capacity(all_tests.len());
    for test in all_tests {
        let results: Vec<TestResult> = db
            .collection::<TestResult>(RESULT_COLLECTION_NAME)
            .find(doc! { "test": uuid_bson(test.id) }, None)
            .await
            .map_err(ServiceError::from)?
            .try_collect()
            .await
            .map_err(ServiceError::from)?;

        let (average_wpm, average_accuracy) = if results.is_empty() {
            (0.0, 0.0)
        } else {
            let len = results.len() as f64;
            (
                results.iter().map(|r| r.wpm).sum::<f64>() / len,
                results.iter().map(|r| r.accuracy).sum::<f64>() / len,
            )
        };

        test_performance.push(TestPerformance {
            test_title: test.title,
            average_wpm,
            average_accuracy,
        });
    }

    Ok(Json(DashboardStats {
        total_students,
        approved_students,
        blocked_students,
        online_students,
        offline_students,
        shifts,
        test_performance,
    }))
}
