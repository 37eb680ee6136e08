//! Custom Axum extractors.
//!
//! - [`Identity`]: the caller identity forwarded by the upstream authorizer
//! - [`RequestReference`]: the reference assigned by the middleware
//!
//! # Examples
//!
//! ```ignore
//! use wild_rydes_web::extractors::{Identity, RequestReference};
//!
//! async fn handler(Identity(auth): Identity, reference: RequestReference) -> String {
//!     format!("{:?} {}", auth.map(|a| a.username), reference.0)
//! }
//! ```

use crate::middleware::{REQUEST_ID_HEADER, RequestReference};
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use serde_json::{Map, Value};
use wild_rydes_core::types::AuthContext;

/// Header carrying the authorizer's claims as a JSON object.
pub const AUTHORIZER_CLAIMS_HEADER: &str = "X-Authorizer-Claims";

/// Claim holding the user name.
pub const USERNAME_CLAIM: &str = "cognito:username";

/// Claim holding the email address.
pub const EMAIL_CLAIM: &str = "email";

/// Caller identity resolved by the upstream authorizer.
///
/// `None` when the header is absent, is not a JSON object, or carries no
/// user name. Deciding what to do about a missing identity is left to the
/// handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity(pub Option<AuthContext>);

impl Identity {
    /// Resolve an identity from a raw claims header value.
    #[must_use]
    pub fn from_claims(raw: &str) -> Option<AuthContext> {
        let claims: Map<String, Value> = match serde_json::from_str(raw) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unparseable authorizer claims");
                return None;
            },
        };

        let username = claims.get(USERNAME_CLAIM)?.as_str()?.to_string();
        let email = claims
            .get(EMAIL_CLAIM)
            .and_then(Value::as_str)
            .map(str::to_string);

        Some(AuthContext { username, email })
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(AUTHORIZER_CLAIMS_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(Self::from_claims);

        Ok(Self(auth))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RequestReference
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Set by the middleware; fall back to the header when it is not
        // installed.
        let reference = parts
            .extensions
            .get::<Self>()
            .cloned()
            .or_else(|| Self::from_header(parts.headers.get(REQUEST_ID_HEADER)))
            .unwrap_or_else(Self::generate);

        Ok(reference)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn identity(claims: Option<&str>) -> Identity {
        let mut builder = Request::builder();
        if let Some(claims) = claims {
            builder = builder.header(AUTHORIZER_CLAIMS_HEADER, claims);
        }
        let (mut parts, ()) = builder.body(()).expect("Valid request").into_parts();
        Identity::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract")
    }

    #[tokio::test]
    async fn claims_resolve_to_identity() {
        let Identity(auth) =
            identity(Some(r#"{"cognito:username": "rider", "email": "rider@example.com"}"#)).await;

        assert_eq!(
            auth,
            Some(AuthContext {
                username: "rider".to_string(),
                email: Some("rider@example.com".to_string()),
            })
        );
    }

    #[tokio::test]
    async fn email_is_optional() {
        let Identity(auth) = identity(Some(r#"{"cognito:username": "rider"}"#)).await;
        assert_eq!(auth.expect("identity").email, None);
    }

    #[tokio::test]
    async fn missing_or_unusable_claims_resolve_to_none() {
        assert_eq!(identity(None).await, Identity(None));
        assert_eq!(identity(Some("not json")).await, Identity(None));
        assert_eq!(identity(Some(r#"{"email": "a@b.c"}"#)).await, Identity(None));
    }

    #[tokio::test]
    async fn reference_prefers_extension_over_header() {
        let mut req = Request::builder()
            .header(REQUEST_ID_HEADER, "from-header")
            .body(())
            .expect("Valid request");
        req.extensions_mut()
            .insert(RequestReference("from-middleware".to_string()));

        let (mut parts, ()) = req.into_parts();
        let reference = RequestReference::from_request_parts(&mut parts, &())
            .await
            .expect("Should extract");

        assert_eq!(reference.0, "from-middleware");
    }
}
