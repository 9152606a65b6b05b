use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rocket::http::{Cookie, CookieJar, Status};
use rocket::request::{self, FromRequest, Request};
use rocket::time::OffsetDateTime;
use serde::{Deserialize, Serialize};

use super::util::date_time_as_unix_seconds;
use crate::data::auth::AuthenticatedUser;
use crate::resp::problem::Problem;
use crate::role::Role;
use crate::security::Security;
use rocket::outcome::Outcome::{Failure, Success};
use uuid::Uuid;

pub static AUTH_COOKIE_NAME: &'static str = "jwt_auth";

/// Claims of an identity token issued by the external provider. The
/// backend never checks credentials itself; everything it knows about the
/// caller's identity comes from this decoded, signature-verified object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub sub: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(with = "date_time_as_unix_seconds")]
    pub iat: DateTime<Utc>,
    #[serde(with = "date_time_as_unix_seconds")]
    pub exp: DateTime<Utc>,
}

impl IdentityClaims {
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => self
                .email
                .split('@')
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    }
}

pub fn verify_identity(
    token: &str,
    public_key: impl AsRef<[u8]>,
) -> Result<IdentityClaims, Problem> {
    decode::<IdentityClaims>(
        token,
        &DecodingKey::from_rsa_pem(public_key.as_ref())
            .expect("identity public key isn't valid. Unable to decode JWT."),
        &Validation::new(Algorithm::PS256),
    )
    .map(|data| data.claims)
    .map_err(|_| auth_problem("Identity token was rejected."))
}

/// The resolved caller attached to every authorized request: who they
/// are, what they may do, and the approval/block flags the assignment
/// guards trust.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRoleToken {
    #[serde(with = "date_time_as_unix_seconds")]
    iat: DateTime<Utc>,
    #[serde(with = "date_time_as_unix_seconds")]
    exp: DateTime<Utc>,
    pub user: Uuid,
    pub role: Role,
    #[serde(default)]
    pub is_approved: bool,
    #[serde(default)]
    pub is_blocked: bool,
}

impl UserRoleToken {
    pub fn new(user: &AuthenticatedUser) -> UserRoleToken {
        let now = Utc::now();
        UserRoleToken {
            iat: now,
            exp: now + Duration::weeks(1),
            user: user.id,
            role: user.role,
            is_approved: user.is_approved,
            is_blocked: user.is_blocked,
        }
    }

    pub fn encode_jwt(
        &self,
        private_key: impl AsRef<[u8]>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let header = Header::new(Algorithm::PS256);
        let key = EncodingKey::from_rsa_pem(private_key.as_ref())
            .expect("session private key isn't valid. Unable to encode JWT.");

        Ok(encode(&header, &self, &key)?)
    }

    pub fn cookie(
        &self,
        private_key: impl AsRef<[u8]>,
    ) -> Result<Cookie<'static>, jsonwebtoken::errors::Error> {
        Ok(
            Cookie::build(AUTH_COOKIE_NAME, self.encode_jwt(private_key)?)
                .secure(true)
                .expires(OffsetDateTime::from_unix_timestamp(self.exp.timestamp()).ok())
                .path("/")
                .http_only(true)
                .finish(),
        )
    }

    /// Students lose access while unapproved or blocked; admins always
    /// pass.
    pub fn can_participate(&self) -> bool {
        self.role >= Role::Admin || (self.is_approved && !self.is_blocked)
    }
}

pub fn auth_problem(detail: impl ToString) -> Problem {
    Problem::new_untyped(Status::Unauthorized, "Unable to authorize user.")
        .detail(detail)
        .clone()
}

fn bearer_token(req: &Request<'_>) -> Option<String> {
    req.headers()
        .get_one("Authorization")?
        .strip_prefix("Bearer ")
        .map(str::to_owned)
}

pub fn extract_claims(
    cookies: &CookieJar,
    bearer: Option<String>,
    public_key: impl AsRef<[u8]>,
) -> Result<UserRoleToken, Problem> {
    let token = match cookies.get(AUTH_COOKIE_NAME) {
        Some(jwt) => jwt.value().to_owned(),
        None => match bearer {
            Some(token) => token,
            None => return Err(auth_problem("No JWT auth cookie or bearer token.")),
        },
    };
    tracing::debug!("extracted jwt auth from request");

    match decode::<UserRoleToken>(
        &token,
        &DecodingKey::from_rsa_pem(public_key.as_ref())
            .expect("session public key isn't valid. Unable to decode JWT."),
        &Validation::new(Algorithm::PS256),
    )
    .map(|data| data.claims)
    {
        Ok(it) => {
            tracing::debug!("decoded user roles token for user: {}", it.user);

            Ok(it)
        }
        Err(_) => Err(auth_problem("JWT was malformed.")),
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for UserRoleToken {
    type Error = Problem;

    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let security: &Security = req.rocket().state().unwrap();

        tracing::trace!("extracting user roles token from request");
        let claims: UserRoleToken = match extract_claims(
            req.cookies(),
            bearer_token(req),
            &security.jwt_keys.public,
        ) {
            Ok(it) => it,
            Err(e) => {
                tracing::debug!("unable to extract claims from request");
                return Failure((Status::Unauthorized, e));
            }
        };

        return Success(claims);
    }
}

pub mod doc {
    use utoipa::openapi::security::*;

    #[derive(Clone, Copy)]
    pub struct JWTAuth;

    impl Into<SecurityScheme> for JWTAuth {
        fn into(self) -> SecurityScheme {
            let mut http = Http::new(HttpAuthScheme::Bearer);
            http.bearer_format = Some("JWT".to_string());
            http.scheme = HttpAuthScheme::Bearer;
            SecurityScheme::Http(http)
        }
    }

    impl utoipa::Modify for JWTAuth {
        fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
            let c = openapi.components.as_mut().unwrap();
            c.add_security_scheme("jwt", *self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::SubsecRound;

    #[test]
    #[ignore = "requires identity keys in SECURITY_DIR"]
    fn jwt_configured_properly() {
        let mut now = Utc::now();
        now = now.round_subsecs(0);

        let user = Uuid::new_v4();

        let urt = UserRoleToken {
            iat: now,
            exp: now + Duration::weeks(1),
            user,
            role: Role::Admin,
            is_approved: true,
            is_blocked: false,
        };

        let security = Security::load();

        let token = urt
            .encode_jwt(&security.jwt_keys.private)
            .expect("encoding should work for example");

        let decoded: UserRoleToken = match decode(
            &token,
            &DecodingKey::from_rsa_pem(&security.jwt_keys.public)
                .expect("identity public key isn't valid. Unable to encode JWT."),
            &Validation::new(Algorithm::PS256),
        )
        .map(|data| data.claims)
        {
            Ok(it) => it,
            Err(_) => panic!("unable to decode encoded token"),
        };

        assert_eq!(now, decoded.iat);
        assert_eq!(now + Duration::weeks(1), decoded.exp);
        assert_eq!(user, decoded.user);
        assert_eq!(decoded.role, Role::Admin);
        assert!(decoded.is_approved);
    }

    #[test]
    fn participation_requires_approval_for_students() {
        let now = Utc::now();
        let mut token = UserRoleToken {
            iat: now,
            exp: now + Duration::weeks(1),
            user: Uuid::new_v4(),
            role: Role::Student,
            is_approved: false,
            is_blocked: false,
        };

        assert!(!token.can_participate());

        token.is_approved = true;
        assert!(token.can_participate());

        token.is_blocked = true;
        assert!(!token.can_participate());

        token.role = Role::Admin;
        assert!(token.can_participate());
    }
}

