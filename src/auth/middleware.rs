//! Identity extraction
//!
//! Authentication happens in the reverse proxy in front of the service
//! (oauth2-proxy or an nginx `auth_request` setup). Handlers only read the
//! identity headers it forwards.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;

use crate::AppState;
use crate::data::User;
use crate::error::AppError;

const USER_HEADERS: [&str; 2] = ["x-forwarded-user", "x-auth-request-user"];
const EMAIL_HEADERS: [&str; 2] = ["x-forwarded-email", "x-auth-request-email"];
const USERNAME_HEADERS: [&str; 2] = [
    "x-forwarded-preferred-username",
    "x-auth-request-preferred-username",
];

/// Identity asserted by the proxy, before it is matched to a stored user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyIdentity {
    pub user_id: String,
    pub email: String,
    pub username: String,
}

/// First non-empty value among `names`
fn first_header(headers: &HeaderMap, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(ToOwned::to_owned)
    })
}

/// Some proxies send the user id as unpadded base64
fn decode_user_id(raw: String) -> String {
    STANDARD_NO_PAD
        .decode(raw.as_bytes())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .filter(|decoded| !decoded.is_empty())
        .unwrap_or(raw)
}

impl ProxyIdentity {
    /// Read the forwarded identity headers
    ///
    /// Returns `None` when no user header is present.
    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        let user_id = decode_user_id(first_header(headers, &USER_HEADERS)?);
        let email = first_header(headers, &EMAIL_HEADERS).unwrap_or_default();
        let mut username = first_header(headers, &USERNAME_HEADERS).unwrap_or_default();

        // The mailbox name wins over the preferred username
        if let Some(at) = email.find('@').filter(|&at| at > 0) {
            username = email[..at].to_string();
        }

        Some(Self {
            user_id,
            email,
            username,
        })
    }
}

/// Extractor for the current user
///
/// The user is created on first sight and their email and username are
/// refreshed on every request.
///
/// # Usage
/// ```ignore
/// async fn handler(CurrentUser(user): CurrentUser) -> impl IntoResponse {
///     format!("Hello, {}", user.username)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<User>().cloned() {
            return Ok(CurrentUser(user));
        }

        let identity = ProxyIdentity::from_headers(&parts.headers).ok_or(AppError::Unauthorized)?;

        let state = AppState::from_ref(state);
        let user = state
            .db
            .get_or_create_user(&identity.user_id, &identity.email, &identity.username)
            .await?;
        parts.extensions.insert(user.clone());

        Ok(CurrentUser(user))
    }
}

/// Extractor for a user with the admin role (403 otherwise)
#[derive(Debug, Clone)]
pub struct AdminUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::warn!(user_id = user.id, "Non-admin user denied admin access");
            return Err(AppError::Forbidden);
        }
        Ok(AdminUser(user))
    }
}
