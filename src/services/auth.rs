//! Who the dashboard is acting for.

/// Authentication state as seen by the data layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    pub user_id: Option<String>,
    /// True while sign-in is still being determined
    pub loading: bool,
}

impl AuthState {
    pub fn signed_in(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            loading: false,
        }
    }

    pub fn signed_out() -> Self {
        Self::default()
    }
}

/// Source of the current user.
pub trait AuthProvider: Send + Sync {
    fn current_user(&self) -> AuthState;
}

/// Fixed user, e.g. from configuration.
#[derive(Debug, Clone)]
pub struct StaticAuth {
    state: AuthState,
}

impl StaticAuth {
    pub fn new(user_id: Option<String>) -> Self {
        let state = match user_id {
            Some(id) => AuthState::signed_in(id),
            None => AuthState::signed_out(),
        };
        Self { state }
    }
}

impl AuthProvider for StaticAuth {
    fn current_user(&self) -> AuthState {
        self.state.clone()
    }
}
