use mongodb::{Client, Database};
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::data::batch::db::{BatchCreateData, BatchDbExt, BatchPage, BatchUpdateData};
use crate::data::batch::BatchView;
use crate::middleware::paging::PageState;
use crate::resp::jwt::{auth_problem, UserRoleToken};
use crate::resp::problem::Problem;
use crate::role::Role;

use super::students::{StudentIdsData, TestIdsData};

/// Create a batch, optionally with initial student and test rosters.
#[utoipa::path(
    request_body = BatchCreateData,
    responses(
        (status = 200, description = "Created batch with populated relations", body = BatchView),
        (status = 401, description = "Missing/expired token or insufficient privileges", body = Problem),
        (status = 409, description = "Batch name already taken", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/batches", format = "application/json", data = "<batch>")]
#[tracing::instrument(skip(client))]
pub async fn batch_create(
    batch: Json<BatchCreateData>,
    auth: UserRoleToken,
    client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<BatchView>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    Ok(Json(
        db.create_batch(client.inner(), auth.user, batch.into_inner())
            .await?,
    ))
}

/// List batches with paging; `active` filters on the activity gate and
/// `mine` restricts to batches created by the caller.
#[utoipa::path(
    responses(
        (status = 200, description = "Page of batches", body = BatchPage),
    ),
    security(("jwt" = []))
)]
#[get("/batches?<active>&<mine>")]
#[tracing::instrument]
pub async fn batch_list(
    active: Option<bool>,
    mine: Option<bool>,
    page: PageState,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<BatchPage>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    let created_by = if mine.unwrap_or(false) {
        Some(auth.user)
    } else {
        None
    };

    Ok(Json(db.list_batches(page, active, created_by).await?))
}

#[utoipa::path(security(("jwt" = [])))]
#[get("/batches/mine")]
#[tracing::instrument]
pub async fn batch_list_mine(
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Vec<BatchView>>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    Ok(Json(db.batches_for_admin(auth.user).await?))
}

#[utoipa::path(
    responses(
        (status = 200, description = "Batch with populated relations", body = BatchView),
        (status = 404, description = "Batch doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/batches/<id>")]
#[tracing::instrument]
pub async fn batch_get(
    id: Uuid,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<BatchView>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    Ok(Json(db.batch_view(id).await?))
}

#[utoipa::path(request_body = BatchUpdateData, security(("jwt" = [])))]
#[put("/batches/<id>", format = "application/json", data = "<update>")]
#[tracing::instrument]
pub async fn batch_update(
    id: Uuid,
    update: Json<BatchUpdateData>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<BatchView>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    Ok(Json(db.update_batch(id, update.into_inner()).await?))
}

/// Delete a batch. Every student and test referencing it is cleaned up in
/// the same transaction.
#[utoipa::path(security(("jwt" = [])))]
#[delete("/batches/<id>")]
#[tracing::instrument(skip(client))]
pub async fn batch_delete(
    id: Uuid,
    auth: UserRoleToken,
    client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<String>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    db.delete_batch(client.inner(), id).await?;
    Ok(Json(id.to_string()))
}

/// Bulk-assign students; the whole request succeeds or fails together.
#[utoipa::path(
    request_body = StudentIdsData,
    responses(
        (status = 200, description = "Batch with the new roster", body = BatchView),
        (status = 404, description = "Batch or referenced students missing", body = Problem),
        (status = 409, description = "Capacity or eligibility conflict", body = Problem),
    ),
    security(("jwt" = []))
)]
#[post("/batches/<id>/students", format = "application/json", data = "<data>")]
#[tracing::instrument(skip(client))]
pub async fn batch_assign_students(
    id: Uuid,
    data: Json<StudentIdsData>,
    auth: UserRoleToken,
    client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<BatchView>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    Ok(Json(
        db.assign_students(client.inner(), id, &data.student_ids)
            .await?,
    ))
}

#[utoipa::path(request_body = StudentIdsData, security(("jwt" = [])))]
#[delete("/batches/<id>/students", format = "application/json", data = "<data>")]
#[tracing::instrument(skip(client))]
pub async fn batch_remove_students(
    id: Uuid,
    data: Json<StudentIdsData>,
    auth: UserRoleToken,
    client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<BatchView>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    Ok(Json(
        db.remove_students(client.inner(), id, &data.student_ids)
            .await?,
    ))
}

#[utoipa::path(request_body = TestIdsData, security(("jwt" = [])))]
#[post("/batches/<id>/tests", format = "application/json", data = "<data>")]
#[tracing::instrument(skip(client))]
pub async fn batch_assign_tests(
    id: Uuid,
    data: Json<TestIdsData>,
    auth: UserRoleToken,
    client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<BatchView>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    Ok(Json(
        db.assign_tests(client.inner(), id, &data.test_ids).await?,
    ))
}

#[utoipa::path(request_body = TestIdsData, security(("jwt" = [])))]
#[delete("/batches/<id>/tests", format = "application/json", data = "<data>")]
#[tracing::instrument(skip(client))]
pub async fn batch_remove_tests(
    id: Uuid,
    data: Json<TestIdsData>,
    auth: UserRoleToken,
    client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<BatchView>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    Ok(Json(
        db.remove_tests(client.inner(), id, &data.test_ids).await?,
    ))
}
