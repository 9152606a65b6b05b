use mongodb::Database;
use rocket::http::CookieJar;
use rocket::serde::json::Json;
use rocket::State;
use utoipa::ToSchema;

use crate::config::Config;
use crate::data::admin::{Admin, ADMIN_COLLECTION_NAME};
use crate::data::auth::{AuthDbExt, AuthenticatedUser};
use crate::data::filter;
use crate::data::student::{Student, STUDENT_COLLECTION_NAME};
use crate::error::{EntityKind, ServiceError};
use crate::resp::jwt::{verify_identity, UserRoleToken, AUTH_COOKIE_NAME};
use crate::resp::problem::Problem;
use crate::security::Security;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginData {
    /// Identity token issued by the external provider.
    pub id_token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub user: AuthenticatedUser,
    pub is_new_user: bool,
}

/// Log in with an externally-issued identity token. First login creates
/// the account; configured admin emails become admin accounts.
#[utoipa::path(
    request_body = LoginData,
    responses(
        (status = 200, description = "Resolved account", body = LoginResponse),
        (status = 401, description = "Identity token rejected", body = Problem),
        (status = 409, description = "Email registered to another subject", body = Problem),
    )
)]
#[post("/auth/login", format = "application/json", data = "<login>")]
#[tracing::instrument(skip(login))]
pub async fn login<'a>(
    login: Json<LoginData>,
    cookies: &'a CookieJar<'_>,
    db: &State<Database>,
    security: &State<Security>,
    c: &State<Config>,
) -> Result<Json<LoginResponse>, Problem> {
    let claims = verify_identity(&login.id_token, &security.jwt_keys.public)?;

    let (user, is_new_user) = db.login_or_register(&claims, &c.admin_emails).await?;

    let urt = UserRoleToken::new(&user);
    cookies.add(urt.cookie(&security.jwt_keys.private)?);

    Ok(Json(LoginResponse { user, is_new_user }))
}

/// Current account as resolved from the session token.
#[utoipa::path(
    responses(
        (status = 200, description = "Current account", body = AuthenticatedUser),
        (status = 401, description = "Missing/expired token", body = Problem),
    ),
    security(("jwt" = []))
)]
#[get("/auth/me")]
#[tracing::instrument]
pub async fn me(
    auth: UserRoleToken,
    db: &State<Database>,
) -> Result<Json<AuthenticatedUser>, Problem> {
    let user = if auth.role.can_administer() {
        let admin = db
            .collection::<Admin>(ADMIN_COLLECTION_NAME)
            .find_one(filter::by_id(auth.user), None)
            .await
            .map_err(ServiceError::from)?
            .ok_or_else(|| ServiceError::not_found(EntityKind::Admin, auth.user))?;
        AuthenticatedUser::from(&admin)
    } else {
        let student = db
            .collection::<Student>(STUDENT_COLLECTION_NAME)
            .find_one(filter::by_id(auth.user), None)
            .await
            .map_err(ServiceError::from)?
            .ok_or_else(|| ServiceError::not_found(EntityKind::Student, auth.user))?;
        AuthenticatedUser::from(&student)
    };

    Ok(Json(user))
}

#[utoipa::path(
    responses((status = 200, description = "Session cookie cleared"))
)]
#[post("/auth/logout")]
#[tracing::instrument]
pub async fn logout<'a>(cookies: &'a CookieJar<'_>) -> () {
    cookies.remove(rocket::http::Cookie::named(AUTH_COOKIE_NAME));
}
