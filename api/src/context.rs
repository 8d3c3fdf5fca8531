use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;

/// Pass-through caller identity used only for `pod.create`'s audit trail.
/// Auth/RBAC/tokens are out of scope here: no signature or token
/// verification happens, unlike the Keycloak layer this is grounded on.
/// A missing `X-Caller-Id` header mints a fresh anonymous id per request.
pub struct RequestContext {
    pub caller_id: Uuid,
}

impl<S> FromRequestParts<S> for RequestContext
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let caller_id = parts
            .headers
            .get("x-caller-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v).ok())
            .unwrap_or_else(Uuid::new_v4);
        Ok(RequestContext { caller_id })
    }
}
