use mongodb::{Client, Database};
use rocket::serde::json::Json;
use rocket::State;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::data::test::db::{TestCreateData, TestDbExt};
use crate::data::test::Test;
use crate::resp::jwt::{auth_problem, UserRoleToken};
use crate::resp::problem::Problem;
use crate::role::Role;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReferenceTextData {
    pub reference_text: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TestActiveData {
    pub is_active: bool,
}

/// Upload a test. The audio resource itself lives elsewhere; only its
/// location is recorded here.
#[utoipa::path(request_body = TestCreateData, security(("jwt" = [])))]
#[post("/tests", format = "application/json", data = "<test>")]
#[tracing::instrument]
pub async fn test_create(
    test: Json<TestCreateData>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Test>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    Ok(Json(db.create_test(auth.user, test.into_inner()).await?))
}

#[utoipa::path(
    responses((status = 200, description = "All tests", body = Vec<Test>)),
    security(("jwt" = []))
)]
#[get("/tests")]
#[tracing::instrument]
pub async fn test_list(
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Vec<Test>>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    Ok(Json(db.list_tests().await?))
}

#[utoipa::path(
    responses(
        (status = 200, description = "Test information", body = Test),
        (status = 404, description = "Test doesn't exist", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/tests/<id>")]
#[tracing::instrument]
pub async fn test_get(
    id: Uuid,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Test>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    Ok(Json(db.get_test(id).await?))
}

#[utoipa::path(request_body = ReferenceTextData, security(("jwt" = [])))]
#[patch("/tests/<id>/text", format = "application/json", data = "<data>")]
#[tracing::instrument]
pub async fn test_attach_text(
    id: Uuid,
    data: Json<ReferenceTextData>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Test>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    Ok(Json(
        db.attach_reference_text(id, data.into_inner().reference_text)
            .await?,
    ))
}

/// Toggle the activity gate. Deactivated tests stop being assignable and
/// disappear from student listings but stay in existing relations.
#[utoipa::path(request_body = TestActiveData, security(("jwt" = [])))]
#[patch("/tests/<id>/active", format = "application/json", data = "<data>")]
#[tracing::instrument]
pub async fn test_set_active(
    id: Uuid,
    data: Json<TestActiveData>,
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<Test>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    Ok(Json(db.set_test_active(id, data.is_active).await?))
}

/// Delete a test, detaching it from batches, students and shifts.
#[utoipa::path(security(("jwt" = [])))]
#[delete("/tests/<id>")]
#[tracing::instrument(skip(client))]
pub async fn test_delete(
    id: Uuid,
    auth: UserRoleToken,
    client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<String>, Problem> {
    if auth.role < Role::Admin {
        return Err(auth_problem("Permission level too low."));
    }

    db.delete_test(client.inner(), id).await?;
    Ok(Json(id.to_string()))
}
