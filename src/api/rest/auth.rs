use std::sync::Arc;

use axum::{extract::Extension, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::info;
use uuid::Uuid;

use crate::{
    domain::models::{Role, User},
    infrastructure::{auth::issue_token, state::AppState},
    services::errors::ServiceError,
};

use super::{to_response, ApiError};

pub fn router() -> Router {
    Router::new().route("/login", post(login))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    credential: String,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
    token: String,
    role: Role,
    unit_id: Option<Uuid>,
}

fn credential_matches(expected: &str, given: &str) -> bool {
    !expected.is_empty() && bool::from(expected.as_bytes().ct_eq(given.as_bytes()))
}

async fn login(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if !credential_matches(&state.config.auth.developer_credential, &payload.credential) {
        return Err(unauthorized());
    }

    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT id, email, role, unit_id, created_at
        FROM users
        WHERE lower(email) = lower($1)
        "#,
    )
    .bind(payload.email.trim())
    .fetch_optional(&state.pool)
    .await
    .map_err(|err| to_response(ServiceError::Internal(err.to_string())))?;

    let Some(user) = user else {
        return Err(unauthorized());
    };

    let token = issue_token(&state, &user).map_err(to_response)?;
    info!(user_id = %user.id, role = user.role.as_str(), "user signed in");

    Ok(Json(LoginResponse {
        token,
        role: user.role,
        unit_id: user.unit_id,
    }))
}

fn unauthorized() -> ApiError {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": "invalid_credentials" })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_returns_expected_payload() {
        let (status, Json(body)) = unauthorized();

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, serde_json::json!({ "error": "invalid_credentials" }));
    }

    #[test]
    fn empty_configured_credential_never_matches() {
        assert!(!credential_matches("", ""));
        assert!(!credential_matches("s3cret", "s3cre"));
        assert!(credential_matches("s3cret", "s3cret"));
    }
}
