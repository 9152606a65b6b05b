use mongodb::{Client, Database};
use rocket::serde::json::Json;
use rocket::State;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::batch::db::BatchDbExt;
use crate::data::batch::BatchView;
use crate::data::id::IdRef;
use crate::data::student::db::{StudentDbExt, StudentPage};
use crate::data::student::{Student, StudentStats, StudentStatus, StudentView};
use crate::data::test::db::TestDbExt;
use crate::data::test::Test;
use crate::middleware::paging::PageState;
use crate::resp::jwt::{auth_problem, UserRoleToken};
use crate::resp::problem::Problem;
use crate::role::Role;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StudentIdsData {
    #[schema(value_type = Vec<String>)]
    pub student_ids: Vec<IdRef>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BatchIdsData {
    #[schema(value_type = Vec<String>)]
    pub batch_ids: Vec<IdRef>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TestIdsData {
    #[schema(value_type = Vec<String>)]
    pub test_ids: Vec<IdRef>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ShiftIdsData {
    #[schema(value_type = Vec<String>)]
    pub shift_ids: Vec<IdRef>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AssignShiftData {
    pub shift_id: Uuid,
}

/// List students with approval filter, name/email search and paging.
#[utoipa::path(
    params(
        ("status", description = "approved | pending | blocked"),
        ("search", description = "name or email substring"),
    ),
    responses(
        (status = 200, description = "Page of students", body = StudentPage),
        (status = 401, description = "Missing/expired token or insufficient privileges", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/students?<status>&<search>")]
#[tracing::instrument]
pub async fn students_list(
    status: Option<StudentStatus>,
    search: Option<String>,
    page: PageState,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<StudentPage>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    Ok(Json(
        db.list_students(page, status, search.as_deref()).await?,
    ))
}

#[utoipa::path(
    responses((status = 200, description = "Approval counters", body = StudentStats)),
    security(("jwt" = []))
)]
#[get("/students/stats")]
#[tracing::instrument]
pub async fn students_stats(
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<StudentStats>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    Ok(Json(db.student_stats().await?))
}

#[utoipa::path(
    responses(
        (status = 200, description = "Student with populated relations", body = StudentView),
        (status = 404, description = "Student doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/students/<id>")]
#[tracing::instrument]
pub async fn student_get(
    id: Uuid,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<StudentView>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    Ok(Json(db.student_view(id).await?))
}

#[utoipa::path(security(("jwt" = [])))]
#[patch("/students/<id>/approve")]
#[tracing::instrument]
pub async fn student_approve(
    id: Uuid,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Student>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    Ok(Json(db.approve_student(id).await?))
}

#[utoipa::path(security(("jwt" = [])))]
#[patch("/students/<id>/block")]
#[tracing::instrument]
pub async fn student_block(
    id: Uuid,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Student>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    Ok(Json(db.block_student(id).await?))
}

#[utoipa::path(security(("jwt" = [])))]
#[patch("/students/<id>/unblock")]
#[tracing::instrument]
pub async fn student_unblock(
    id: Uuid,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Student>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    Ok(Json(db.unblock_student(id).await?))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkUpdateResponse {
    pub modified_count: u64,
}

#[utoipa::path(request_body = StudentIdsData, security(("jwt" = [])))]
#[patch("/students/bulk/approve", format = "application/json", data = "<data>")]
#[tracing::instrument]
pub async fn students_bulk_approve(
    data: Json<StudentIdsData>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<BulkUpdateResponse>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    let modified_count = db.bulk_approve(&data.student_ids).await?;
    Ok(Json(BulkUpdateResponse { modified_count }))
}

#[utoipa::path(request_body = StudentIdsData, security(("jwt" = [])))]
#[patch("/students/bulk/block", format = "application/json", data = "<data>")]
#[tracing::instrument]
pub async fn students_bulk_block(
    data: Json<StudentIdsData>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<BulkUpdateResponse>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    let modified_count = db.bulk_block(&data.student_ids).await?;
    Ok(Json(BulkUpdateResponse { modified_count }))
}

/// Replace the student's batch assignments wholesale. Batch rosters are
/// reconciled in the same transaction.
#[utoipa::path(
    request_body = BatchIdsData,
    responses(
        (status = 200, description = "Student with the new assignments", body = StudentView),
        (status = 404, description = "Student or referenced batches missing", body = Problem),
        (status = 409, description = "Capacity or eligibility conflict", body = Problem),
    ),
    security(("jwt" = []))
)]
#[put("/students/<id>/batches", format = "application/json", data = "<data>")]
#[tracing::instrument(skip(client))]
pub async fn student_replace_batches(
    id: Uuid,
    data: Json<BatchIdsData>,
    auth: UserRoleToken,
    client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<StudentView>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    Ok(Json(
        db.replace_batches(client.inner(), id, &data.batch_ids).await?,
    ))
}

#[utoipa::path(request_body = TestIdsData, security(("jwt" = [])))]
#[put("/students/<id>/tests", format = "application/json", data = "<data>")]
#[tracing::instrument(skip(client))]
pub async fn student_replace_tests(
    id: Uuid,
    data: Json<TestIdsData>,
    auth: UserRoleToken,
    client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<StudentView>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    Ok(Json(db.replace_tests(client.inner(), id, &data.test_ids).await?))
}

#[utoipa::path(request_body = ShiftIdsData, security(("jwt" = [])))]
#[put("/students/<id>/shifts", format = "application/json", data = "<data>")]
#[tracing::instrument(skip(client))]
pub async fn student_replace_shifts(
    id: Uuid,
    data: Json<ShiftIdsData>,
    auth: UserRoleToken,
    client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<StudentView>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    Ok(Json(db.replace_shifts(client.inner(), id, &data.shift_ids).await?))
}

#[utoipa::path(request_body = AssignShiftData, security(("jwt" = [])))]
#[post("/students/<id>/shifts", format = "application/json", data = "<data>")]
#[tracing::instrument(skip(client))]
pub async fn student_assign_shift(
    id: Uuid,
    data: Json<AssignShiftData>,
    auth: UserRoleToken,
    client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<StudentView>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    Ok(Json(db.assign_shift(client.inner(), id, data.shift_id).await?))
}

#[utoipa::path(security(("jwt" = [])))]
#[delete("/students/<id>")]
#[tracing::instrument(skip(client))]
pub async fn student_delete(
    id: Uuid,
    auth: UserRoleToken,
    client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<String>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    db.delete_student(client.inner(), id).await?;
    Ok(Json(id.to_string()))
}

///////////////////////
//  STUDENT SELF-SERVICE
///////////////////////

/// Batches the calling student belongs to.
#[utoipa::path(
    responses((status = 200, description = "Assigned batches", body = Vec<BatchView>)),
    security(("jwt" = []))
)]
#[get("/student/batches")]
#[tracing::instrument]
pub async fn my_batches(
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Vec<BatchView>>, Problem> {
    if !auth.can_participate() {
        return Err(auth_problem("Account is pending approval or blocked."));
    }

    Ok(Json(db.batches_for_student(auth.user).await?))
}

/// Active tests the calling student can take, through batches or direct
/// assignment.
#[utoipa::path(
    responses((status = 200, description = "Available tests", body = Vec<Test>)),
    security(("jwt" = []))
)]
#[get("/student/tests")]
#[tracing::instrument]
pub async fn my_tests(
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Vec<Test>>, Problem> {
    if !auth.can_participate() {
        return Err(auth_problem("Account is pending approval or blocked."));
    }

    Ok(Json(db.tests_for_student(auth.user).await?))
}

#[utoipa::path(security(("jwt" = [])))]
#[get("/student/batches/<batch_id>/tests")]
#[tracing::instrument]
pub async fn my_batch_tests(
    batch_id: Uuid,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Vec<Test>>, Problem> {
    if !auth.can_participate() {
        return Err(auth_problem("Account is pending approval or blocked."));
    }

    let batch = db.get_batch(batch_id).await?;
    if !batch.students.contains(&auth.user) {
        return Err(Problem::new_untyped(
            rocket::http::Status::Forbidden,
            "You are not assigned to this batch.",
        ));
    }

    Ok(Json(db.tests_for_batch(batch_id).await?))
}
