//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs issued by the identity server with the user id in
//! `sub` and the portal role in `role`. The middleware validates the token and
//! stores a [`CurrentUser`] in the request extensions; handlers pull it out
//! with the extractor implemented here.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::models::{Role, Subrole};
use crate::state::AppState;
use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Claims {
    sub: String,
    role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subrole: Option<Subrole>,
    iat: usize,
    exp: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    aud: Option<String>,
}

/// Authenticated caller of the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: String,
    pub role: Role,
    pub subrole: Subrole,
    /// Raw bearer token, forwarded to the identity server.
    pub token: String,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| Error::Unauthorized("Authentication required".to_string()))
    }
}

pub struct JwtAuth {
    enabled: bool,
    secret: Vec<u8>,
    issuer: Option<String>,
    audience: Option<String>,
    public_paths: Vec<String>,
    token_ttl_seconds: u64,
}

impl JwtAuth {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = match &config.jwt_secret {
            Some(s) if !s.is_empty() => s.as_bytes().to_vec(),
            _ => {
                if config.enabled {
                    tracing::warn!(
                        "Auth enabled but `auth.jwt_secret` is not set; using an ephemeral secret"
                    );
                }
                format!("{}{}", Uuid::new_v4(), Uuid::new_v4()).into_bytes()
            }
        };

        Self {
            enabled: config.enabled,
            secret,
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            public_paths: config.public_paths.clone(),
            token_ttl_seconds: config.token_ttl_seconds,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_public_path(&self, path: &str) -> bool {
        self.public_paths.iter().any(|pattern| match pattern.strip_suffix('*') {
            Some(prefix) => path.starts_with(prefix),
            None => path == pattern,
        })
    }

    /// Issues a token for `user_id`; used by tooling and tests.
    pub fn issue(&self, user_id: &str, role: Role, subrole: Option<Subrole>) -> Result<String> {
        let now = now_epoch_seconds();
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            subrole,
            iat: now,
            exp: now.saturating_add(self.token_ttl_seconds as usize),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .map_err(|e| Error::Internal(format!("Failed to sign token: {e}")))
    }

    pub fn authenticate(&self, token: &str) -> Result<CurrentUser> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        match &self.issuer {
            Some(issuer) => validation.set_issuer(&[issuer]),
            None => validation.iss = None,
        }
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let data = decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map_err(|e| Error::Unauthorized(format!("Invalid token: {e}")))?;
        Ok(CurrentUser {
            user_id: data.claims.sub,
            role: data.claims.role,
            subrole: data.claims.subrole.unwrap_or_default(),
            token: token.to_string(),
        })
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
}

/// Validates the bearer token when present; requires one outside public paths
/// while auth is enabled.
pub async fn auth_middleware(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let auth = &state.auth;

    match bearer_token(req.headers()) {
        Some(token) => match auth.authenticate(token) {
            Ok(user) => {
                tracing::Span::current().record("user_id", user.user_id.as_str());
                req.extensions_mut().insert(user);
            }
            Err(e) => return e.into_response(),
        },
        None => {
            let path = req.uri().path();
            let anonymous_allowed = !auth.is_enabled()
                || auth.is_public_path(path)
                || req.method() == axum::http::Method::OPTIONS;
            if !anonymous_allowed {
                return Error::Unauthorized("Missing bearer token".to_string()).into_response();
            }
        }
    }

    next.run(req).await
}

fn now_epoch_seconds() -> usize {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth(issuer: Option<&str>) -> JwtAuth {
        JwtAuth::new(&AuthConfig {
            enabled: true,
            jwt_secret: Some("test-secret".to_string()),
            issuer: issuer.map(str::to_string),
            audience: None,
            public_paths: vec!["/health".to_string(), "/api/v1/codeficator*".to_string()],
            token_ttl_seconds: 60,
        })
    }

    #[test]
    fn issued_tokens_round_trip() {
        let auth = auth(Some("identity"));
        let token = auth
            .issue("user-1", Role::Provider, Some(Subrole::ProviderDeputy))
            .unwrap();
        let user = auth.authenticate(&token).unwrap();
        assert_eq!(user.user_id, "user-1");
        assert_eq!(user.role, Role::Provider);
        assert_eq!(user.subrole, Subrole::ProviderDeputy);
        assert!(!user.is_admin());
    }

    #[test]
    fn tokens_from_another_issuer_are_rejected() {
        let token = auth(Some("other")).issue("u", Role::Parent, None).unwrap();
        assert!(matches!(
            auth(Some("identity")).authenticate(&token),
            Err(Error::Unauthorized(_))
        ));
    }

    #[test]
    fn public_paths_support_prefixes() {
        let auth = auth(None);
        assert!(auth.is_public_path("/health"));
        assert!(auth.is_public_path("/api/v1/codeficator/children"));
        assert!(!auth.is_public_path("/health/details"));
        assert!(!auth.is_public_path("/api/v1/providers"));
    }

    #[test]
    fn bearer_prefix_is_case_tolerant() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc"));
        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }
}
