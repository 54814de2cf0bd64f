//! Application router.
//!
//! ```text
//! GET  /health                              liveness
//! POST /auth/login                          sign in, sets cookies
//! POST /auth/logout                         revoke and clear cookies
//! POST /auth/refresh                        rotate tokens
//! GET  <root>/api/me                        current principal      (gated)
//! GET  <root>/api/sessions                  caller's sessions      (gated)
//! POST <root>/api/sessions/revoke-all       log out everywhere     (gated)
//! ```
//!
//! `<root>` is the protected area root (`/admin` by default). The gate runs
//! on every request under it, including paths no route matches.

use axum::{
    Router,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
};
use paddock_auth::{AccountStore, AttemptStore, SessionStore};
use tower_http::trace::TraceLayer;

use crate::handlers::{health, login, session};
use crate::middleware::{admin_gate, correlate};
use crate::state::AppState;

/// Build the router over `state`.
pub fn app_router<A, S, T>(state: AppState<A, S, T>) -> Router
where
    A: AccountStore + 'static,
    S: SessionStore + Clone + 'static,
    T: AttemptStore + 'static,
{
    let api = format!("{}/api", state.auth.config().protected_area.root());

    Router::new()
        .route("/health", get(health::health_check))
        .route("/auth/login", post(login::login::<A, S, T>))
        .route("/auth/logout", post(session::logout::<A, S, T>))
        .route("/auth/refresh", post(session::refresh::<A, S, T>))
        .route(&format!("{api}/me"), get(session::me))
        .route(
            &format!("{api}/sessions"),
            get(session::list_sessions::<A, S, T>),
        )
        .route(
            &format!("{api}/sessions/revoke-all"),
            post(session::revoke_all::<A, S, T>),
        )
        .fallback(not_found)
        .layer(from_fn_with_state(state.clone(), admin_gate::<A, S, T>))
        .layer(TraceLayer::new_for_http())
        .layer(from_fn(correlate))
        .with_state(state)
}

#[allow(clippy::unused_async)]
async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
