use mongodb::{Client, Database};
use rocket::serde::json::Json;
use rocket::State;
use uuid::Uuid;

use crate::data::shift::db::{ShiftCreateData, ShiftDbExt};
use crate::data::shift::Shift;
use crate::resp::jwt::{auth_problem, UserRoleToken};
use crate::resp::problem::Problem;
use crate::role::Role;

#[utoipa::path(request_body = ShiftCreateData, security(("jwt" = [])))]
#[post("/shifts", format = "application/json", data = "<shift>")]
#[tracing::instrument]
pub async fn shift_create(
    shift: Json<ShiftCreateData>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Shift>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    Ok(Json(db.create_shift(shift.into_inner()).await?))
}

#[utoipa::path(
    responses((status = 200, description = "All shifts", body = Vec<Shift>)),
    security(("jwt" = []))
)]
#[get("/shifts")]
#[tracing::instrument]
pub async fn shift_list(
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Vec<Shift>>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    Ok(Json(db.list_shifts().await?))
}

#[utoipa::path(security(("jwt" = [])))]
#[get("/shifts/<id>")]
#[tracing::instrument]
pub async fn shift_get(
    id: Uuid,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Shift>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    Ok(Json(db.get_shift(id).await?))
}

/// Delete a shift; students assigned to it are unassigned, submitted
/// results stay.
#[utoipa::path(security(("jwt" = [])))]
#[delete("/shifts/<id>")]
#[tracing::instrument(skip(client))]
pub async fn shift_delete(
    id: Uuid,
    auth: UserRoleToken,
    client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<String>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    db.delete_shift(client.inner(), id).await?;
    Ok(Json(id.to_string()))
}
