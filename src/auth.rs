// src/auth.rs

use jsonwebtoken::{encode, decode, Algorithm, Header, Validation, EncodingKey, DecodingKey};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use uuid::Uuid;

use dotenvy::dotenv;

static CONFIG: Lazy<AuthConfig> = Lazy::new(|| {
    dotenv().ok();
    AuthConfig::from_env()
});

#[derive(Debug, Clone)]
pub enum AuthError {
    InvalidToken(String),
    TokenExpired,
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken(e.to_string()),
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::InvalidToken(msg) => write!(f, "Invalid token: {}", msg),
            AuthError::TokenExpired => write!(f, "Token expired"),
        }
    }
}

impl std::error::Error for AuthError {}

struct AuthConfig {
    secret: String,
}

impl AuthConfig {
    /// Секрет верификации выдаёт identity-провайдер.
    /// Без JWT_SECRET работаем на dev-секрете (и предупреждаем).
    fn from_env() -> Self {
        let secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            tracing::warn!("JWT_SECRET not set, falling back to dev secret");
            "dev-secret-change-me".to_string()
        });
        Self { secret }
    }
}

// === Claims ===

/// Identity-провайдер кладёт в токен организацию, её имя и роль
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub org: Uuid,
    pub org_name: Option<String>,
    pub role: String,
    pub exp: usize,
    pub iat: usize,
}

impl Claims {
    /// Роль приходит как непрозрачная строка вида `org:admin` —
    /// нормализуем, срезая префикс
    pub fn normalized_role(&self) -> &str {
        self.role.strip_prefix("org:").unwrap_or(&self.role)
    }

    /// Мутации разрешены только админам; все прочие роли — read-only
    pub fn is_admin(&self) -> bool {
        self.normalized_role() == "admin"
    }
}

// === Функции ===

pub fn generate_token(
    user_id: &str,
    org: Uuid,
    org_name: Option<&str>,
    role: &str,
) -> Result<String, AuthError> {
    let now = chrono::Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_owned(),
        org,
        org_name: org_name.map(str::to_owned),
        role: role.to_owned(),
        exp: now + 24 * 3600,
        iat: now,
    };

    let encoding_key = EncodingKey::from_secret(CONFIG.secret.as_bytes());
    encode(&Header::new(Algorithm::HS256), &claims, &encoding_key).map_err(Into::into)
}

pub fn validate_token(token: &str) -> Result<Claims, AuthError> {
    let decoding_key = DecodingKey::from_secret(CONFIG.secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    let data = decode::<Claims>(token, &decoding_key, &validation)?;
    Ok(data.claims)
}
