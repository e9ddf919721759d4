//! Request extractors shared by the route handlers.

use axum::Json;
use axum::extract::FromRequestParts;
use axum::extract::rejection::JsonRejection;
use axum::http::request::Parts;
use common::{Actor, ActorRole, ItemId, OrderId};

use crate::error::ApiError;

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_ROLE_HEADER: &str = "x-actor-role";

/// The caller, taken from the `x-actor-id` / `x-actor-role` headers.
///
/// Identity is trusted as given; authenticating it happens upstream.
#[derive(Debug, Clone)]
pub struct RequestActor(pub Actor);

impl<S: Send + Sync> FromRequestParts<S> for RequestActor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let actor_id = header(parts, ACTOR_ID_HEADER)?;
        let role = header(parts, ACTOR_ROLE_HEADER)?;
        let role = ActorRole::parse(&role.to_ascii_lowercase())
            .ok_or_else(|| ApiError::BadRequest(format!("Unknown actor role: {role}")))?;
        Ok(RequestActor(Actor::new(actor_id, role)))
    }
}

fn header(parts: &Parts, name: &str) -> Result<String, ApiError> {
    let value = parts
        .headers
        .get(name)
        .ok_or_else(|| ApiError::BadRequest(format!("Missing {name} header")))?
        .to_str()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {name} header")))?
        .trim();
    if value.is_empty() {
        return Err(ApiError::BadRequest(format!("Empty {name} header")));
    }
    Ok(value.to_string())
}

/// A JSON body that may be left out entirely.
///
/// A request without a JSON content type gets the default; a body that is
/// present but malformed is still a bad request.
pub fn optional_body<T: Default>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(T::default()),
        Err(rejection) => Err(rejection.into()),
    }
}

pub fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid order ID: {e}")))?;
    Ok(OrderId::from_uuid(uuid))
}

pub fn parse_item_id(id: &str) -> Result<ItemId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid item ID: {e}")))?;
    Ok(ItemId::from_uuid(uuid))
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(request: Request<()>) -> Result<RequestActor, ApiError> {
        let (mut parts, _) = request.into_parts();
        RequestActor::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_actor_from_headers() {
        let request = Request::builder()
            .header(ACTOR_ID_HEADER, "m-7")
            .header(ACTOR_ROLE_HEADER, "Merchant")
            .body(())
            .unwrap();

        let RequestActor(actor) = extract(request).await.unwrap();
        assert_eq!(actor.actor_id, "m-7");
        assert_eq!(actor.actor_role, ActorRole::Merchant);
    }

    #[tokio::test]
    async fn missing_or_unknown_role_is_rejected() {
        let no_role = Request::builder()
            .header(ACTOR_ID_HEADER, "m-7")
            .body(())
            .unwrap();
        assert!(matches!(extract(no_role).await, Err(ApiError::BadRequest(_))));

        let bad_role = Request::builder()
            .header(ACTOR_ID_HEADER, "m-7")
            .header(ACTOR_ROLE_HEADER, "root")
            .body(())
            .unwrap();
        assert!(matches!(extract(bad_role).await, Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn ids_must_be_uuids() {
        assert!(parse_order_id("not-a-uuid").is_err());
        let id = uuid::Uuid::new_v4();
        assert_eq!(parse_item_id(&id.to_string()).unwrap().as_uuid(), id);
    }
}
