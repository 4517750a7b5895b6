use std::sync::atomic::{AtomicBool, Ordering};

use crate::usecases::contracts::AuthCollaborator;

const AUTH_CREDENTIAL_REJECTED: &str = "AUTH_CREDENTIAL_REJECTED";

/// Static bearer credential from config or environment.
///
/// There is no interactive login here; a rejection is recorded so the
/// binary can exit with a clear message instead of polling on.
#[derive(Default)]
pub struct StaticTokenAuth {
    token: Option<String>,
    rejected: AtomicBool,
}

impl StaticTokenAuth {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|token| !token.trim().is_empty()),
            rejected: AtomicBool::new(false),
        }
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    pub fn is_rejected(&self) -> bool {
        self.rejected.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for StaticTokenAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenAuth")
            .field("has_token", &self.has_token())
            .field("rejected", &self.is_rejected())
            .finish()
    }
}

impl AuthCollaborator for StaticTokenAuth {
    fn bearer_token(&self) -> Option<String> {
        self.token.clone()
    }

    fn on_unauthorized(&self) {
        if !self.rejected.swap(true, Ordering::SeqCst) {
            tracing::error!(
                code = AUTH_CREDENTIAL_REJECTED,
                has_token = self.has_token(),
                "chat service rejected the configured credential"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_token_counts_as_missing() {
        let auth = StaticTokenAuth::new(Some("   ".to_owned()));

        assert!(!auth.has_token());
        assert_eq!(auth.bearer_token(), None);
    }

    #[test]
    fn rejection_is_sticky() {
        let auth = StaticTokenAuth::new(Some("abc".to_owned()));

        auth.on_unauthorized();
        auth.on_unauthorized();

        assert!(auth.is_rejected());
    }

    #[test]
    fn debug_output_hides_token() {
        let auth = StaticTokenAuth::new(Some("super-secret-token".to_owned()));

        assert!(!format!("{auth:?}").contains("super-secret-token"));
    }
}
