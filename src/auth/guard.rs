//! Route guard over session state.
//!
//! The guard answers exactly one question: is a live session present. Role
//! mismatch is policy the surrounding route table enforces by choosing
//! which guarded subtree to mount; `role_matches` exists for that check.

use std::sync::Arc;

use crate::auth::session::SessionManager;
use crate::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    RedirectToLogin,
}

pub struct AccessGuard {
    session: Arc<SessionManager>,
}

impl AccessGuard {
    pub fn new(session: Arc<SessionManager>) -> Self {
        Self { session }
    }

    /// Presence predicate for guarded views. The `required_role` parameter
    /// names the subtree being entered but does not change the decision;
    /// an authenticated user with the wrong role is the route table's
    /// problem, not a redirect-to-login.
    pub fn can_enter(&self, _required_role: Option<Role>) -> GuardDecision {
        if self.session.is_authenticated() {
            GuardDecision::Allow
        } else {
            GuardDecision::RedirectToLogin
        }
    }

    /// Role check for the route table when it mounts a role-gated subtree.
    pub fn role_matches(&self, required: Role) -> bool {
        self.session.role() == Some(required)
    }

    pub fn is_admin(&self) -> bool {
        self.session
            .role()
            .map(|role| role.is_admin())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::mock::MockTransport;
    use crate::auth::storage::MemorySessionStore;
    use crate::models::Credentials;
    use chrono::Utc;

    async fn authenticated_manager(role: &str) -> Arc<SessionManager> {
        let manager = Arc::new(SessionManager::new(Arc::new(MemorySessionStore::new())));
        let transport = MockTransport::new();
        transport.route(
            "POST",
            "/auth/login",
            serde_json::json!({
                "token": "tok",
                "user": {"id": 1, "email": "a@b.c", "firstName": "A", "lastName": "B"},
                "role": role,
                "exp": Utc::now().timestamp() + 600
            }),
        );
        manager
            .login(
                &transport,
                &Credentials {
                    email: "a@b.c".into(),
                    password: "pw".into(),
                },
            )
            .await
            .unwrap();
        manager
    }

    #[tokio::test]
    async fn test_anonymous_is_redirected() {
        let manager = Arc::new(SessionManager::new(Arc::new(MemorySessionStore::new())));
        let guard = AccessGuard::new(manager);
        assert_eq!(guard.can_enter(None), GuardDecision::RedirectToLogin);
        assert_eq!(
            guard.can_enter(Some(Role::Admin)),
            GuardDecision::RedirectToLogin
        );
    }

    #[tokio::test]
    async fn test_presence_allows_even_on_role_mismatch() {
        let guard = AccessGuard::new(authenticated_manager("user").await);
        // Entering the admin subtree is allowed by the guard; the route
        // table decides what to mount
        assert_eq!(guard.can_enter(Some(Role::Admin)), GuardDecision::Allow);
        assert!(!guard.role_matches(Role::Admin));
        assert!(guard.role_matches(Role::User));
        assert!(!guard.is_admin());
    }

    #[tokio::test]
    async fn test_admin_role_checks() {
        let guard = AccessGuard::new(authenticated_manager("admin").await);
        assert!(guard.is_admin());
        assert!(guard.role_matches(Role::Admin));
    }

    #[tokio::test]
    async fn test_logout_revokes_access() {
        let manager = authenticated_manager("user").await;
        let guard = AccessGuard::new(manager.clone());
        assert_eq!(guard.can_enter(None), GuardDecision::Allow);
        manager.logout();
        assert_eq!(guard.can_enter(None), GuardDecision::RedirectToLogin);
    }
}
