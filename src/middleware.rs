// src/middleware.rs

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{self, Claims};
use crate::status_service::StatusService;

/// Состояние приложения
pub type AppState = Arc<StatusService>;

/// Заголовок, скоупящий каждый запрос к организации
pub const ORG_HEADER: &str = "X-Organization-Id";

/// Типизированный результат для ошибок аутентификации/скоупинга
#[derive(Debug)]
pub enum AuthGateError {
    NoToken,
    InvalidToken,
    MissingOrgHeader,
    InvalidOrgHeader,
    OrgMismatch,
    Forbidden,
}

impl IntoResponse for AuthGateError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthGateError::NoToken => (StatusCode::UNAUTHORIZED, "Missing token"),
            AuthGateError::InvalidToken => (StatusCode::UNAUTHORIZED, "Invalid or expired token"),
            AuthGateError::MissingOrgHeader => {
                (StatusCode::BAD_REQUEST, "Missing X-Organization-Id header")
            }
            AuthGateError::InvalidOrgHeader => {
                (StatusCode::BAD_REQUEST, "X-Organization-Id is not a valid UUID")
            }
            AuthGateError::OrgMismatch => {
                (StatusCode::FORBIDDEN, "Organization scope does not match token")
            }
            AuthGateError::Forbidden => (StatusCode::FORBIDDEN, "Admin role required"),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Извлечение `Claims` из заголовка Authorization
#[async_trait]
impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = AuthGateError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "));

        let token = auth_header.ok_or(AuthGateError::NoToken)?;

        match auth::validate_token(token) {
            Ok(claims) => Ok(claims),
            Err(_) => Err(AuthGateError::InvalidToken),
        }
    }
}

/// Организация, к которой скоупится запрос (из заголовка)
#[derive(Debug, Clone, Copy)]
pub struct OrgScope(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for OrgScope
where
    S: Send + Sync,
{
    type Rejection = AuthGateError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ORG_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or(AuthGateError::MissingOrgHeader)?;

        let org_id = Uuid::parse_str(raw).map_err(|_| AuthGateError::InvalidOrgHeader)?;
        Ok(OrgScope(org_id))
    }
}

/// Кросс-тенантный доступ — жёсткий отказ, не тихая фильтрация
pub fn authorize(claims: &Claims, scope: &OrgScope) -> Result<(), AuthGateError> {
    if claims.org != scope.0 {
        return Err(AuthGateError::OrgMismatch);
    }
    Ok(())
}

/// Проверка, что токен принадлежит админу организации
pub fn require_admin(claims: &Claims) -> Result<(), AuthGateError> {
    if !claims.is_admin() {
        return Err(AuthGateError::Forbidden);
    }
    Ok(())
}
