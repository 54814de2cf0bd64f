//! Session handlers: logout, token refresh and the caller's own sessions.

use axum::{
    Extension, Json,
    extract::State,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::{DateTime, Utc};
use paddock_auth::{
    AccountStore, AccountSummary, AttemptStore, Principal, Session, SessionId, SessionStore,
    TokenKind,
};
use serde::Serialize;

use crate::cookies;
use crate::error::AppError;
use crate::extractors::RequestDevice;
use crate::state::AppState;

/// Response after logout.
#[derive(Debug, Clone, Serialize)]
pub struct LogoutResponse {
    /// Success message.
    pub message: &'static str,
}

/// End the current session.
///
/// Revokes the sessions behind the access and refresh cookies, then clears
/// all credential cookies. When the store cannot be reached the cookies are
/// kept, so the client can retry.
///
/// # Endpoint
///
/// ```text
/// POST /auth/logout
/// ```
///
/// # Errors
///
/// `503` when the session store is unavailable.
pub async fn logout<A, S, T>(
    State(state): State<AppState<A, S, T>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<LogoutResponse>), AppError>
where
    A: AccountStore + 'static,
    S: SessionStore + Clone + 'static,
    T: AttemptStore + 'static,
{
    let access = cookies::access_token(&jar);
    let refresh = cookies::refresh_token(&jar);

    state
        .auth
        .logout(access.as_deref(), refresh.as_deref())
        .await?;

    Ok((
        state.cookies.clear(jar),
        Json(LogoutResponse {
            message: "Logged out",
        }),
    ))
}

/// Exchange the refresh cookie for fresh tokens.
///
/// The presented refresh token is spent; a replay fails.
///
/// # Endpoint
///
/// ```text
/// POST /auth/refresh
/// ```
///
/// # Errors
///
/// - `401` when the refresh cookie is missing, invalid, revoked or expired;
///   credential cookies are cleared
/// - `503` when the store is unavailable
pub async fn refresh<A, S, T>(
    State(state): State<AppState<A, S, T>>,
    RequestDevice(device): RequestDevice,
    jar: CookieJar,
) -> Response
where
    A: AccountStore + 'static,
    S: SessionStore + Clone + 'static,
    T: AttemptStore + 'static,
{
    let Some(token) = cookies::refresh_token(&jar) else {
        return AppError::unauthorized(paddock_auth::error::SIGN_IN_AGAIN_MESSAGE).into_response();
    };

    match state.auth.refresh(&token, device).await {
        Ok(success) => {
            let jar = state.cookies.set_login(jar, &success);
            (jar, Json::<AccountSummary>(success.summary)).into_response()
        }
        Err(e) if e.is_transient() => AppError::from(e).into_response(),
        Err(e) => {
            tracing::debug!(kind = e.kind(), "Refresh refused");
            (state.cookies.clear(jar), AppError::from(e)).into_response()
        }
    }
}

/// The authenticated caller.
///
/// # Endpoint
///
/// ```text
/// GET /admin/api/me
/// ```
#[allow(clippy::unused_async)]
pub async fn me(Extension(principal): Extension<Principal>) -> Json<Principal> {
    Json(principal)
}

/// One active session as shown to its owner.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    /// Session ID.
    pub id: SessionId,
    /// Token class.
    pub kind: TokenKind,
    /// Issue time.
    pub issued_at: DateTime<Utc>,
    /// Expiry.
    pub expires_at: DateTime<Utc>,
    /// Last authenticated request.
    pub last_activity_at: DateTime<Utc>,
    /// `desktop`, `mobile` or `tablet`.
    pub device_type: String,
    /// Whether this is the session making the request.
    pub current: bool,
}

impl SessionView {
    fn new(session: Session, current: SessionId) -> Self {
        Self {
            current: session.id == current,
            id: session.id,
            kind: session.kind,
            issued_at: session.issued_at,
            expires_at: session.expires_at,
            last_activity_at: session.last_activity_at,
            device_type: session.device.device_type,
        }
    }
}

/// Active sessions of the caller's account.
///
/// # Endpoint
///
/// ```text
/// GET /admin/api/sessions
/// ```
///
/// # Errors
///
/// `503` when the session store is unavailable.
pub async fn list_sessions<A, S, T>(
    State(state): State<AppState<A, S, T>>,
    Extension(principal): Extension<Principal>,
) -> Result<Json<Vec<SessionView>>, AppError>
where
    A: AccountStore + 'static,
    S: SessionStore + Clone + 'static,
    T: AttemptStore + 'static,
{
    let sessions = state.auth.active_sessions(principal.account_id).await?;
    Ok(Json(
        sessions
            .into_iter()
            .map(|s| SessionView::new(s, principal.session_id))
            .collect(),
    ))
}

/// Response after "log out everywhere".
#[derive(Debug, Clone, Serialize)]
pub struct RevokeAllResponse {
    /// Number of sessions ended.
    pub revoked: u64,
}

/// End every session of the caller's account, this one included.
///
/// # Endpoint
///
/// ```text
/// POST /admin/api/sessions/revoke-all
/// ```
///
/// # Errors
///
/// `503` when the session store is unavailable.
pub async fn revoke_all<A, S, T>(
    State(state): State<AppState<A, S, T>>,
    Extension(principal): Extension<Principal>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<RevokeAllResponse>), AppError>
where
    A: AccountStore + 'static,
    S: SessionStore + Clone + 'static,
    T: AttemptStore + 'static,
{
    let revoked = state.auth.revoke_all_sessions(principal.account_id).await?;
    Ok((state.cookies.clear(jar), Json(RevokeAllResponse { revoked })))
}
