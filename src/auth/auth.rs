use actix_web::{FromRequest, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

use super::jwt::verify_token;
use crate::config::Config;
use crate::error::{HrError, HrResult};
use crate::model::role::Role;

/// The caller, as established by the bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: u64,
    pub username: String,
    pub role: Role,
}

fn unauthorized(message: &str) -> HrError {
    HrError::Unauthorized {
        message: message.to_string(),
    }
}

impl FromRequest for AuthUser {
    type Error = HrError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

fn authenticate(req: &HttpRequest) -> HrResult<AuthUser> {
    let token = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| unauthorized("Missing token"))?;

    let config = req
        .app_data::<Data<Config>>()
        .ok_or_else(|| HrError::storage("Config missing from app data"))?;

    let claims = verify_token(token, &config.jwt_secret)?;
    let role = Role::from_id(claims.role).ok_or_else(|| unauthorized("Invalid role"))?;

    Ok(AuthUser {
        user_id: claims.user_id,
        username: claims.sub,
        role,
    })
}

/// Admin outranks employee; nothing outranks admin.
pub fn authorize(caller: Role, required: Role) -> HrResult<()> {
    match (caller, required) {
        (Role::Admin, _) | (Role::Employee, Role::Employee) => Ok(()),
        (Role::Employee, Role::Admin) => Err(HrError::forbidden("Admin only")),
    }
}

impl AuthUser {
    pub fn require_admin(&self) -> HrResult<()> {
        authorize(self.role, Role::Admin)
    }

    /// Returns true if the user is an employee
    pub fn is_employee(&self) -> bool {
        self.role == Role::Employee
    }

    /// `Some(own id)` when the caller may only see their own records.
    pub fn scope(&self) -> Option<u64> {
        self.is_employee().then_some(self.user_id)
    }
}
