use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::error::{HrError, HrResult};

/// Access-token claims. Tokens are issued by the identity service; this
/// crate only verifies them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: u64,
    pub sub: String,
    /// Role id, see [`crate::model::role::Role::from_id`].
    pub role: u8,
    pub exp: usize,
}

pub fn verify_token(token: &str, secret: &str) -> HrResult<Claims> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        tracing::debug!(error = %e, "Token rejected");
        HrError::Unauthorized {
            message: "Invalid or expired token".to_string(),
        }
    })
}
