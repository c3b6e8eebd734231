//! Sign-in state in front of the auth collaborator

use memora_client::{AuthBackend, Credentials, User};
use std::sync::Arc;

use crate::error::Result;

/// Tracks who is signed in.
///
/// `loading` stays true until the first `restore` completes, so callers can
/// tell "not signed in" apart from "not checked yet".
pub struct AuthGate {
    backend: Arc<dyn AuthBackend>,
    user: Option<User>,
    loading: bool,
}

impl AuthGate {
    pub fn new(backend: Arc<dyn AuthBackend>) -> Self {
        Self {
            backend,
            user: None,
            loading: true,
        }
    }

    pub fn current_user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.user.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Pick up an existing session. Failures count as signed out.
    pub async fn restore(&mut self) -> Option<&User> {
        self.loading = true;
        self.user = match self.backend.current_user().await {
            Ok(user) => user,
            Err(e) => {
                tracing::warn!("Could not restore session: {}", e);
                None
            }
        };
        self.loading = false;
        self.user.as_ref()
    }

    pub async fn login(&mut self, credentials: &Credentials) -> Result<&User> {
        let user = self.backend.login(credentials).await?;
        tracing::info!("Signed in as {}", user.username);
        self.loading = false;
        Ok(&*self.user.insert(user))
    }

    pub async fn register(&mut self, credentials: &Credentials) -> Result<&User> {
        let user = self.backend.register(credentials).await?;
        tracing::info!("Registered {}", user.username);
        self.loading = false;
        Ok(&*self.user.insert(user))
    }

    /// Sign out locally even if the backend call fails
    pub async fn logout(&mut self) -> Result<()> {
        let result = self.backend.logout().await;
        self.user = None;
        result.map_err(Into::into)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use memora_client::Error as ClientError;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub(crate) struct MockAuth {
        pub session: Mutex<Option<User>>,
        pub fail_restore: bool,
    }

    impl MockAuth {
        pub(crate) fn signed_in() -> Self {
            Self {
                session: Mutex::new(Some(user("alice"))),
                fail_restore: false,
            }
        }
    }

    pub(crate) fn user(name: &str) -> User {
        User {
            username: name.into(),
            email: format!("{}@example.com", name),
        }
    }

    fn credentials(name: &str, password: &str) -> Credentials {
        Credentials {
            username: name.into(),
            email: format!("{}@example.com", name),
            password: password.into(),
        }
    }

    #[async_trait]
    impl AuthBackend for MockAuth {
        async fn login(&self, credentials: &Credentials) -> memora_client::Result<User> {
            if credentials.password != "secret" {
                return Err(ClientError::rejected(401, "Invalid credentials"));
            }
            let user = user(&credentials.username);
            *self.session.lock() = Some(user.clone());
            Ok(user)
        }

        async fn register(&self, credentials: &Credentials) -> memora_client::Result<User> {
            let user = user(&credentials.username);
            *self.session.lock() = Some(user.clone());
            Ok(user)
        }

        async fn logout(&self) -> memora_client::Result<()> {
            *self.session.lock() = None;
            Ok(())
        }

        async fn current_user(&self) -> memora_client::Result<Option<User>> {
            if self.fail_restore {
                return Err(ClientError::Stream("connection refused".into()));
            }
            Ok(self.session.lock().clone())
        }
    }

    #[tokio::test]
    async fn test_loading_until_restored() {
        let mut gate = AuthGate::new(Arc::new(MockAuth::signed_in()));
        assert!(gate.is_loading());
        assert!(!gate.is_signed_in());

        let restored = gate.restore().await.cloned();
        assert_eq!(restored, Some(user("alice")));
        assert!(!gate.is_loading());
    }

    #[tokio::test]
    async fn test_restore_failure_is_signed_out() {
        let mut gate = AuthGate::new(Arc::new(MockAuth {
            session: Mutex::new(Some(user("alice"))),
            fail_restore: true,
        }));
        assert!(gate.restore().await.is_none());
        assert!(!gate.is_loading());
    }

    #[tokio::test]
    async fn test_login_and_logout() {
        let mut gate = AuthGate::new(Arc::new(MockAuth::default()));
        gate.restore().await;
        assert!(!gate.is_signed_in());

        let err = gate.login(&credentials("bob", "wrong")).await.unwrap_err();
        assert!(err.is_rejection());
        assert!(!gate.is_signed_in());

        gate.login(&credentials("bob", "secret")).await.unwrap();
        assert_eq!(gate.current_user().map(|u| u.username.as_str()), Some("bob"));

        gate.logout().await.unwrap();
        assert!(gate.current_user().is_none());
    }

    #[tokio::test]
    async fn test_register_signs_in() {
        let mut gate = AuthGate::new(Arc::new(MockAuth::default()));
        gate.register(&credentials("carol", "pw")).await.unwrap();
        assert!(gate.is_signed_in());
    }
}
