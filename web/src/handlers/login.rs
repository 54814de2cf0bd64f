//! Login handler.

use axum::{Json, extract::State};
use axum_extra::extract::cookie::CookieJar;
use paddock_auth::{AccountStore, AccountSummary, AttemptStore, LoginRequest, SessionStore};

use crate::WebResult;
use crate::extractors::{CorrelationId, RequestDevice};
use crate::state::AppState;

/// Sign in with email and password.
///
/// # Endpoint
///
/// ```text
/// POST /auth/login
/// Content-Type: application/json
///
/// {
///   "identifier": "organizer@example.com",
///   "secret": "...",
///   "rememberMe": true
/// }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "accountId": "uuid",
///   "role": "organizer",
///   "assignedEventId": 42
/// }
/// ```
///
/// plus the `paddock_access`, `paddock_session` and (with `rememberMe`)
/// `paddock_refresh` cookies.
///
/// # Errors
///
/// - `401` with one generic message for every authentication failure
/// - `429` with a generic "try again later" while the account is locked
/// - `503` when the credential store is unavailable
pub async fn login<A, S, T>(
    State(state): State<AppState<A, S, T>>,
    correlation_id: CorrelationId,
    RequestDevice(device): RequestDevice,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> WebResult<(CookieJar, Json<AccountSummary>)>
where
    A: AccountStore + 'static,
    S: SessionStore + Clone + 'static,
    T: AttemptStore + 'static,
{
    tracing::debug!(
        correlation_id = %correlation_id.0,
        device_type = %device.device_type,
        "Login attempt"
    );

    let success = state.auth.login(request, device).await?;
    let jar = state.cookies.set_login(jar, &success);

    Ok((jar, Json(success.summary)))
}
