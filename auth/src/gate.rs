//! Authorization gate for the admin area.
//!
//! Every request into the protected area is reduced to one of three
//! outcomes:
//!
//! ```text
//! no token ──────────────────────────────► RedirectLogin (keep cookies)
//! bad / expired / wrong-kind token ──────► RedirectLogin (clear cookies)
//! session revoked, expired, unknown,
//!   or store error / timeout ────────────► RedirectLogin (clear cookies)
//! global role ───────────────────────────► Allow
//! scoped role, no assigned event ────────► RedirectLogin (clear cookies)
//! scoped role, path under its event ─────► Allow
//! scoped role, any other path ───────────► RedirectScoped(<root>/events/<id>)
//! ```
//!
//! The gate fails closed: anything it cannot establish positively ends in a
//! login redirect. Callers never learn which check failed; the reason is
//! only logged.

use crate::config::ProtectedArea;
use crate::constants::metric_names;
use crate::providers::SessionStore;
use crate::registry::SessionRegistry;
use crate::state::{EventId, Principal, Role, SessionStatus, TokenKind};
use crate::tokens::TokenService;

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Proceed with the request as this principal.
    Allow(Principal),
    /// Send the caller to the login page.
    RedirectLogin {
        /// Whether the presented credential cookies should be cleared.
        clear_credentials: bool,
    },
    /// Valid credential, but outside its event: send the caller to the
    /// landing page of its own event.
    RedirectScoped {
        /// Landing path of the caller's event.
        location: String,
    },
}

impl GateDecision {
    /// Label for logs and metrics.
    #[must_use]
    pub const fn outcome(&self) -> &'static str {
        match self {
            Self::Allow(_) => "allow",
            Self::RedirectLogin { .. } => "redirect_login",
            Self::RedirectScoped { .. } => "redirect_scoped",
        }
    }

    const fn login(clear_credentials: bool) -> Self {
        Self::RedirectLogin { clear_credentials }
    }
}

/// Outcome of the path check for verified claims.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathAccess {
    /// The role may reach the path.
    Allowed,
    /// The path is outside the caller's event.
    OutOfScope {
        /// Landing path of the caller's event.
        location: String,
    },
    /// Event-scoped role without an assigned event.
    Misconfigured,
}

/// Decide whether `role` with `assigned_event_id` may reach `path`.
///
/// Global roles reach every path. Event-scoped roles reach their event's
/// landing path and everything below it, compared on whole path segments.
/// Paths with `.` or `..` segments (including percent-encoded ones) are
/// never considered inside an event.
///
/// # Examples
///
/// ```
/// # use paddock_auth::gate::{authorize_path, PathAccess};
/// # use paddock_auth::{EventId, ProtectedArea, Role};
/// let area = ProtectedArea::default();
/// assert_eq!(
///     authorize_path(&area, Role::Organizer, Some(EventId(42)), "/admin/events/42/registrations"),
///     PathAccess::Allowed,
/// );
/// assert_eq!(
///     authorize_path(&area, Role::Organizer, Some(EventId(42)), "/admin/events/7/registrations"),
///     PathAccess::OutOfScope { location: "/admin/events/42".into() },
/// );
/// ```
#[must_use]
pub fn authorize_path(
    area: &ProtectedArea,
    role: Role,
    assigned_event_id: Option<EventId>,
    path: &str,
) -> PathAccess {
    if role.is_global() {
        return PathAccess::Allowed;
    }

    let Some(event_id) = assigned_event_id else {
        return PathAccess::Misconfigured;
    };

    let prefix = area.event_prefix(event_id);
    if is_within(&prefix, path) {
        PathAccess::Allowed
    } else {
        PathAccess::OutOfScope { location: prefix }
    }
}

fn is_within(prefix: &str, path: &str) -> bool {
    if path.split('/').any(is_dot_segment) {
        return false;
    }
    path == prefix
        || path
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn is_dot_segment(segment: &str) -> bool {
    let decoded = segment.to_ascii_lowercase().replace("%2e", ".");
    decoded == "." || decoded == ".."
}

/// The authorization gate.
#[derive(Clone)]
pub struct AuthorizationGate<S> {
    tokens: TokenService,
    registry: SessionRegistry<S>,
    area: ProtectedArea,
}

impl<S> AuthorizationGate<S>
where
    S: SessionStore + Clone + 'static,
{
    /// Create a gate.
    pub fn new(
        tokens: TokenService,
        registry: SessionRegistry<S>,
        area: ProtectedArea,
    ) -> Self {
        Self {
            tokens,
            registry,
            area,
        }
    }

    /// Protected area this gate guards.
    pub const fn area(&self) -> &ProtectedArea {
        &self.area
    }

    /// Decide the fate of a request for `path` carrying `token`.
    pub async fn check(&self, token: Option<&str>, path: &str) -> GateDecision {
        let decision = self.decide(token, path).await;
        metrics::counter!(metric_names::GATE_DECISIONS, "outcome" => decision.outcome())
            .increment(1);
        decision
    }

    async fn decide(&self, token: Option<&str>, path: &str) -> GateDecision {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            tracing::debug!(path, "No access token");
            return GateDecision::login(false);
        };

        let claims = match self.tokens.verify_access(token) {
            Ok(claims) => claims,
            Err(reason) => {
                tracing::debug!(path, %reason, "Access token rejected");
                return GateDecision::login(true);
            }
        };

        let fingerprint = claims.fingerprint();
        let session = match self.registry.lookup(&fingerprint).await {
            Ok(SessionStatus::Active(session)) => session,
            Ok(status) => {
                tracing::debug!(
                    path,
                    account_id = %claims.account_id,
                    fingerprint = fingerprint.short(),
                    ?status,
                    "Session not active"
                );
                return GateDecision::login(true);
            }
            Err(e) => {
                tracing::warn!(path, error = %e, "Session lookup failed, denying");
                return GateDecision::login(true);
            }
        };

        if session.account_id != claims.account_id || session.kind != TokenKind::Access {
            tracing::warn!(
                session_id = %session.id,
                account_id = %claims.account_id,
                "Session does not belong to token, denying"
            );
            return GateDecision::login(true);
        }

        match authorize_path(&self.area, claims.role, claims.assigned_event_id, path) {
            PathAccess::Allowed => {}
            PathAccess::OutOfScope { location } => {
                tracing::debug!(
                    path,
                    account_id = %claims.account_id,
                    location = %location,
                    "Path outside assigned event"
                );
                return GateDecision::RedirectScoped { location };
            }
            PathAccess::Misconfigured => {
                tracing::warn!(
                    account_id = %claims.account_id,
                    role = %claims.role,
                    "Event-scoped role without assigned event"
                );
                return GateDecision::login(true);
            }
        }

        self.registry.touch(&session);

        GateDecision::Allow(Principal {
            account_id: claims.account_id,
            role: claims.role,
            assigned_event_id: if claims.role.is_global() {
                None
            } else {
                claims.assigned_event_id
            },
            session_id: session.id,
            expires_at: claims.expiry().min(session.expires_at),
        })
    }
}
