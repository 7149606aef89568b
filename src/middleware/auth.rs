//! Caller identity as supplied by the upstream authentication layer.
//!
//! Authentication itself happens before requests reach this service; it
//! forwards the verified actor in `x-actor-id` / `x-actor-role`. Admin routes
//! are additionally guarded by the platform admin key.

use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::domain::{ActorRef, Initiator};
use crate::error::AppError;
use crate::AppState;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Restaurant,
    Admin,
}

impl Role {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Role::User),
            "restaurant" => Some(Role::Restaurant),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Restaurant => "restaurant",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, AppError> {
        let id = headers
            .get(ACTOR_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Uuid::parse_str(v.trim()).ok())
            .ok_or_else(|| AppError::Unauthorized("missing or malformed actor id".to_string()))?;
        let role = headers
            .get(ACTOR_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| Role::parse(v.trim()))
            .ok_or_else(|| AppError::Unauthorized("missing or malformed actor role".to_string()))?;
        Ok(Actor { id, role })
    }

    pub fn initiator(&self) -> Initiator {
        match self.role {
            Role::User => Initiator::User(self.id),
            Role::Restaurant => Initiator::Restaurant(self.id),
            Role::Admin => Initiator::System,
        }
    }

    fn require(self, role: Role) -> Result<Self, AppError> {
        if self.role == role {
            Ok(self)
        } else {
            Err(AppError::Unauthorized(format!(
                "this endpoint requires the {} role",
                role.as_str()
            )))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Actor::from_headers(&parts.headers)
    }
}

/// An actor with the `user` role.
#[derive(Debug, Clone, Copy)]
pub struct UserActor(pub Uuid);

impl UserActor {
    pub fn wallet(&self) -> ActorRef {
        ActorRef::user(self.0)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for UserActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor = Actor::from_headers(&parts.headers)?.require(Role::User)?;
        Ok(UserActor(actor.id))
    }
}

/// An actor with the `restaurant` role.
#[derive(Debug, Clone, Copy)]
pub struct RestaurantActor(pub Uuid);

impl RestaurantActor {
    pub fn wallet(&self) -> ActorRef {
        ActorRef::restaurant(self.0)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for RestaurantActor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor = Actor::from_headers(&parts.headers)?.require(Role::Restaurant)?;
        Ok(RestaurantActor(actor.id))
    }
}

/// Requires `Authorization: Bearer <ADMIN_API_KEY>`.
pub async fn admin_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let presented = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    match presented {
        Some(key) if constant_time_eq(key.as_bytes(), state.admin_api_key.as_bytes()) => {
            Ok(next.run(req).await)
        }
        _ => {
            tracing::warn!(uri = %req.uri(), "rejected admin request");
            Err(AppError::Unauthorized("invalid admin key".to_string()))
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(id: &str, role: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACTOR_ID_HEADER, HeaderValue::from_str(id).unwrap());
        headers.insert(ACTOR_ROLE_HEADER, HeaderValue::from_str(role).unwrap());
        headers
    }

    #[test]
    fn parses_actor_headers() {
        let id = Uuid::new_v4();
        let actor = Actor::from_headers(&headers(&id.to_string(), "restaurant")).unwrap();
        assert_eq!(actor.id, id);
        assert_eq!(actor.initiator(), Initiator::Restaurant(id));
    }

    #[test]
    fn rejects_malformed_actor() {
        assert!(Actor::from_headers(&HeaderMap::new()).is_err());
        assert!(Actor::from_headers(&headers("not-a-uuid", "user")).is_err());
        assert!(Actor::from_headers(&headers(&Uuid::new_v4().to_string(), "root")).is_err());
    }

    #[test]
    fn role_mismatch_is_unauthorized() {
        let actor = Actor::from_headers(&headers(&Uuid::new_v4().to_string(), "user")).unwrap();
        assert!(matches!(
            actor.require(Role::Restaurant),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn compares_keys_exactly() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secret2"));
    }
}
