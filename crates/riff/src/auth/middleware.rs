//! Authentication middleware.

use axum::{
    extract::{FromRequestParts, State},
    http::{HeaderMap, Uri, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use log::{debug, warn};
use std::sync::Arc;

use super::{AuthConfig, AuthError, Claims, Role};

/// Lifetime of tokens issued by [`AuthState::generate_token`].
const TOKEN_TTL_SECS: i64 = 3600 * 24;

/// Extract a Bearer token from an Authorization header value.
fn bearer_token_from_header(header_value: &str) -> Result<&str, AuthError> {
    let mut parts = header_value.split_whitespace();
    let scheme = parts.next().ok_or(AuthError::InvalidAuthHeader)?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::InvalidAuthHeader);
    }

    let token = parts.next().ok_or(AuthError::InvalidAuthHeader)?;
    if token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }

    if parts.next().is_some() {
        return Err(AuthError::InvalidAuthHeader);
    }

    Ok(token)
}

fn token_from_cookie_header<'a>(cookie_header: &'a str, cookie_name: &str) -> Option<&'a str> {
    cookie_header.split(';').map(str::trim).find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        if name.trim() == cookie_name {
            Some(value.trim())
        } else {
            None
        }
    })
}

/// Token passed as `access_token=` or `token=` in the query string.
fn token_from_query(uri: &Uri) -> Option<String> {
    uri.query()?.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        if key == "access_token" || key == "token" {
            urlencoding::decode(value).ok().map(|s| s.into_owned())
        } else {
            None
        }
    })
}

/// Authentication state shared across handlers.
#[derive(Clone)]
pub struct AuthState {
    config: Arc<AuthConfig>,
    decoding_key: Option<DecodingKey>,
}

impl AuthState {
    /// Create new auth state from config.
    /// Resolves `env:VAR_NAME` syntax in jwt_secret at construction time.
    pub fn new(mut config: AuthConfig) -> Self {
        if let Ok(Some(resolved)) = config.resolve_jwt_secret() {
            config.jwt_secret = Some(resolved);
        }

        let decoding_key = config
            .jwt_secret
            .as_ref()
            .map(|s| DecodingKey::from_secret(s.as_bytes()));

        Self {
            config: Arc::new(config),
            decoding_key,
        }
    }

    pub fn is_dev_mode(&self) -> bool {
        self.config.dev_mode
    }

    pub fn allowed_origins(&self) -> &[String] {
        &self.config.allowed_origins
    }

    /// Validate a bearer token and return its claims.
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        if self.config.dev_mode {
            if let Some(user_id) = token.strip_prefix("dev:") {
                return self.get_dev_user_claims(user_id);
            }
        }

        let decoding_key = self
            .decoding_key
            .as_ref()
            .ok_or_else(|| AuthError::Internal("no JWT secret configured".to_string()))?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.required_spec_claims.clear();

        let token_data = decode::<Claims>(token, decoding_key, &validation).map_err(|e| {
            warn!("JWT validation failed: {:?}", e);
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(e.to_string()),
            }
        })?;

        if token_data.claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken("empty subject".to_string()));
        }

        Ok(token_data.claims)
    }

    fn get_dev_user_claims(&self, user_id: &str) -> Result<Claims, AuthError> {
        let user = self
            .config
            .dev_users
            .iter()
            .find(|u| u.id == user_id)
            .ok_or(AuthError::UserNotFound)?;

        Ok(Claims {
            sub: user.id.clone(),
            iss: Some("dev".to_string()),
            exp: Utc::now().timestamp() + TOKEN_TTL_SECS,
            iat: Some(Utc::now().timestamp()),
            name: Some(user.name.clone()),
            roles: vec![user.role.to_string()],
            role: Some(user.role.to_string()),
        })
    }

    /// Issue an HS256 token for `user_id`.
    pub fn generate_token(&self, user_id: &str, name: &str, role: Role) -> Result<String, AuthError> {
        let secret = self
            .config
            .jwt_secret
            .as_ref()
            .ok_or_else(|| AuthError::Internal("no JWT secret configured".to_string()))?;

        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            iss: Some("riff".to_string()),
            exp: now + TOKEN_TTL_SECS,
            iat: Some(now),
            name: Some(name.to_string()),
            roles: vec![role.to_string()],
            role: Some(role.to_string()),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .map_err(|e| AuthError::Internal(e.to_string()))
    }

    /// Authenticate a request from its headers and URI.
    ///
    /// Token sources in priority order:
    /// 1. Authorization: Bearer <token> header
    /// 2. auth_token cookie
    /// 3. access_token / token query parameter (browsers can't set headers on WS)
    /// 4. X-Dev-User header (dev mode only)
    pub fn authenticate(&self, headers: &HeaderMap, uri: &Uri) -> Result<Claims, AuthError> {
        let auth_header = headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok());

        let cookie_token = headers
            .get(axum::http::header::COOKIE)
            .and_then(|h| h.to_str().ok())
            .and_then(|cookie_header| token_from_cookie_header(cookie_header, "auth_token"));

        if let Some(header) = auth_header {
            let token = bearer_token_from_header(header)?;
            self.validate_token(token)
        } else if let Some(token) = cookie_token {
            self.validate_token(token)
        } else if let Some(token) = token_from_query(uri) {
            self.validate_token(&token)
        } else if self.is_dev_mode() {
            let user_id = headers
                .get("X-Dev-User")
                .and_then(|h| h.to_str().ok())
                .ok_or(AuthError::MissingAuthHeader)?;
            debug!("Using dev user: {}", user_id);
            self.validate_token(&format!("dev:{}", user_id))
        } else {
            Err(AuthError::MissingAuthHeader)
        }
    }
}

/// Authenticated identity extracted from request.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub claims: Claims,
}

impl CurrentUser {
    /// The identity events are scoped to.
    pub fn id(&self) -> &str {
        &self.claims.sub
    }

    pub fn role(&self) -> Role {
        self.claims.effective_role()
    }

    pub fn display_name(&self) -> &str {
        self.claims.display_name()
    }
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AuthError::MissingAuthHeader)
    }
}

/// Authentication middleware.
///
/// Rejects the request before it reaches any handler when no valid identity
/// can be established; otherwise injects `CurrentUser` into request extensions.
pub async fn auth_middleware(
    State(auth): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let claims = auth.authenticate(req.headers(), req.uri())?;
    req.extensions_mut().insert(CurrentUser { claims });
    Ok(next.run(req).await)
}

/// Require a role allowed to publish status events.
#[derive(Debug, Clone)]
pub struct RequireService(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireService
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AuthError::MissingAuthHeader)?;

        if !user.role().can_publish() {
            return Err(AuthError::InsufficientPermissions(
                "service role required".to_string(),
            ));
        }

        Ok(RequireService(user))
    }
}
