use mongodb::{Client, Database};
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::data::result::db::{ResultDbExt, ResultSubmitData};
use crate::data::result::TestResult;
use crate::resp::jwt::{auth_problem, UserRoleToken};
use crate::resp::problem::Problem;
use crate::role::Role;

/// Submit a result for the calling student. The result document and the
/// student's history entry land atomically.
#[utoipa::path(
    request_body = ResultSubmitData,
    responses(
        (status = 200, description = "Stored result", body = TestResult),
        (status = 404, description = "Referenced test or shift missing", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/results", format = "application/json", data = "<data>")]
#[tracing::instrument(skip(client))]
pub async fn result_submit(
    data: Json<ResultSubmitData>,
    auth: UserRoleToken,
    client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<TestResult>, Problem> {
    if !auth.can_participate() {
        return Err(auth_problem("Account is pending approval or blocked."));
    }

    Ok(Json(
        db.submit_result(client.inner(), auth.user, data.into_inner())
            .await?,
    ))
}

#[utoipa::path(
    responses((status = 200, description = "Results submitted within a shift", body = Vec<TestResult>)),
    security(("jwt" = []))
)]
#[get("/results/shift/<shift_id>")]
#[tracing::instrument]
pub async fn shift_results(
    shift_id: Uuid,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Vec<TestResult>>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    Ok(Json(db.results_for_shift(shift_id).await?))
}

#[utoipa::path(security(("jwt" = [])))]
#[get("/results/mine")]
#[tracing::instrument]
pub async fn my_results(
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Vec<TestResult>>, Problem> {
    Ok(Json(db.results_for_student(auth.user).await?))
}
