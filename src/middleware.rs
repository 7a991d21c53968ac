use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::USER_AGENT, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::any::Any;
use std::net::SocketAddr;
use tracing::debug;
use uuid::Uuid;

use crate::error_tracker::{ErrorContext, ErrorEvent, TrackedError};
use crate::key_generator::{extract_client_ip, user_id};
use crate::state::SharedState;

tokio::task_local! {
    static IN_REQUEST: ();
}

/// Whether the current task is serving an HTTP request.
pub fn in_request() -> bool {
    IN_REQUEST.try_with(|_| ()).is_ok()
}

/// Logging middleware for request/response tracking
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client_ip = extract_client_ip(request.headers(), peer);

    debug!(
        target: "storefront::middleware",
        method = %method,
        uri = %uri,
        client_ip = %client_ip,
        "Incoming request"
    );

    let response = next.run(request).await;

    debug!(
        target: "storefront::middleware",
        method = %method,
        uri = %uri,
        status = %response.status(),
        "Request completed"
    );

    response
}

/// Record every response that carries a [`TrackedError`] in the error tracker.
pub async fn track_errors(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    let action = format!("{} {}", request.method(), request.uri().path());
    let url = request.uri().to_string();
    let store_id = store_id_from_path(request.uri().path());
    let user = user_id(request.headers()).map(str::to_string);
    let user_agent = request
        .headers()
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let mut response = IN_REQUEST.scope((), next.run(request)).await;

    if let Some(tracked) = response.extensions_mut().remove::<TrackedError>() {
        let mut context = ErrorContext::action(action);
        if let Some(store_id) = store_id {
            context = context.with_store(store_id.to_string());
        }
        if let Some(user) = user {
            context = context.with_user(user);
        }
        state
            .error_tracker
            .record(ErrorEvent::new(tracked, context).with_request(user_agent.as_deref(), url));
    }

    response
}

/// Turn a handler panic into a plain 500 that the tracking layer records.
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response {
    let tracked = TrackedError::from_panic(payload.as_ref());
    let mut response = (StatusCode::INTERNAL_SERVER_ERROR, "Internal Error").into_response();
    response.extensions_mut().insert(tracked);
    response
}

/// Store id of a `/api/{storeId}/...` path.
fn store_id_from_path(path: &str) -> Option<Uuid> {
    let mut segments = path.trim_start_matches('/').split('/');
    match (segments.next(), segments.next()) {
        (Some("api"), Some(candidate)) => Uuid::parse_str(candidate).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_id_from_path() {
        let id = Uuid::new_v4();
        assert_eq!(
            store_id_from_path(&format!("/api/{}/products", id)),
            Some(id)
        );
        assert_eq!(store_id_from_path("/api/stores"), None);
        assert_eq!(store_id_from_path("/api/health"), None);
        assert_eq!(store_id_from_path("/"), None);
    }

    #[test]
    fn test_handle_panic_attaches_tracked_error() {
        let response = handle_panic(Box::new("handler exploded"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let tracked = response.extensions().get::<TrackedError>().unwrap();
        assert_eq!(tracked.name, "Panic");
        assert_eq!(tracked.message, "handler exploded");
    }

    #[tokio::test]
    async fn test_in_request_scope() {
        assert!(!in_request());
        IN_REQUEST.scope((), async { assert!(in_request()) }).await;
        assert!(!in_request());
    }
}
