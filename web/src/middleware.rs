//! Axum middleware.
//!
//! - [`correlate`]: correlation ID per request, echoed in the response
//!   and attached to the request's tracing span
//! - [`admin_gate`]: runs the authorization gate for every request inside
//!   the protected area
//!
//! # Gate outcomes
//!
//! | decision          | response                                             |
//! |-------------------|------------------------------------------------------|
//! | `Allow`           | request proceeds with the [`Principal`] as extension |
//! | `RedirectLogin`   | `303` to the login page, credential cookies cleared  |
//! | `RedirectScoped`  | `303` to the caller's event landing page             |
//!
//! Denials are routing decisions, never error pages.
//!
//! [`Principal`]: paddock_auth::Principal

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use paddock_auth::{AccountStore, AttemptStore, GateDecision, SessionStore};
use tracing::Instrument;

use crate::cookies;
use crate::extractors::CorrelationId;
use crate::state::AppState;

/// Header name for correlation ID.
pub const CORRELATION_ID_HEADER: &str = "X-Correlation-ID";

/// Correlation middleware. Install with `axum::middleware::from_fn` as the
/// outermost layer so gate redirects carry the ID too.
///
/// Keeps a well-formed `X-Correlation-ID` from the client and replaces
/// anything else with a fresh one. Handlers read it as a [`CorrelationId`]
/// extension; the response echoes it.
pub async fn correlate(mut request: Request, next: Next) -> Response {
    let correlation_id = CorrelationId::from_headers(request.headers());
    request.extensions_mut().insert(correlation_id);

    // Only the path: query strings may carry tokens.
    let span = tracing::info_span!(
        "http_request",
        correlation_id = %correlation_id.0,
        method = %request.method(),
        path = %request.uri().path(),
    );

    let mut response = next.run(request).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&correlation_id.0.to_string()) {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }
    response
}

/// Authorization gate middleware for the protected area.
///
/// Requests outside the area pass straight through. Install with
/// `axum::middleware::from_fn_with_state`.
pub async fn admin_gate<A, S, T>(
    State(state): State<AppState<A, S, T>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response
where
    A: AccountStore + 'static,
    S: SessionStore + Clone + 'static,
    T: AttemptStore + 'static,
{
    let path = request.uri().path().to_owned();
    if !state.auth.gate().area().contains(&path) {
        return next.run(request).await;
    }

    let token = cookies::access_token(&jar);
    match state.auth.authorize(token.as_deref(), &path).await {
        GateDecision::Allow(principal) => {
            request.extensions_mut().insert(principal);
            next.run(request).await
        }
        GateDecision::RedirectLogin { clear_credentials } => {
            let jar = if clear_credentials {
                state.cookies.clear(jar)
            } else {
                jar
            };
            (jar, Redirect::to(&state.login_path)).into_response()
        }
        GateDecision::RedirectScoped { location } => Redirect::to(&location).into_response(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        middleware::from_fn,
        routing::post,
    };
    use tower::ServiceExt;
    use uuid::Uuid;

    /// Echoes the correlation ID the handler sees.
    fn app() -> Router {
        Router::new()
            .route(
                "/auth/login",
                post(|id: CorrelationId| async move { (StatusCode::UNAUTHORIZED, id.0.to_string()) }),
            )
            .layer(from_fn(correlate))
    }

    async fn send(header: Option<&str>) -> (String, String) {
        let mut builder = Request::post("/auth/login");
        if let Some(value) = header {
            builder = builder.header(CORRELATION_ID_HEADER, value);
        }
        let response = app().oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let echoed = response
            .headers()
            .get(CORRELATION_ID_HEADER)
            .expect("correlation header")
            .to_str()
            .unwrap()
            .to_string();
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        (echoed, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_failed_login_is_traceable_by_client_id() {
        let id = Uuid::new_v4().to_string();
        let (echoed, seen) = send(Some(&id)).await;
        assert_eq!(echoed, id);
        assert_eq!(seen, id);
    }

    #[tokio::test]
    async fn test_handler_and_response_share_generated_id() {
        let (echoed, seen) = send(None).await;
        assert!(Uuid::parse_str(&echoed).is_ok());
        assert_eq!(echoed, seen);
    }

    #[tokio::test]
    async fn test_malformed_client_id_is_replaced() {
        let (echoed, seen) = send(Some("'; DROP TABLE sessions; --")).await;
        assert!(Uuid::parse_str(&echoed).is_ok());
        assert_eq!(echoed, seen);
    }
}
