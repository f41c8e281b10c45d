//! Credential handling and the re-authenticate-once retry decorator
//!
//! Every outbound request runs through [`AuthSession::call`]. When the
//! backend answers that the token has expired, the session re-authenticates,
//! stores the new credential and retries the request exactly once.

use crate::catalog::ServiceCatalog;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use gauge_core::{Error, Result};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Tokens this close to expiry are refreshed before use
const EXPIRY_MARGIN_SECS: i64 = 30;

/// Result of one successful authentication
#[derive(Clone)]
pub struct AuthToken {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub project_id: Option<String>,
    pub project_name: Option<String>,
    pub catalog: ServiceCatalog,
}

impl AuthToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
            project_id: None,
            project_name: None,
            catalog: ServiceCatalog::default(),
        }
    }
}

impl std::fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("project_id", &self.project_id)
            .field("project_name", &self.project_name)
            .finish()
    }
}

/// Obtains a fresh token from the identity service
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self) -> Result<AuthToken>;
}

/// The token attached to outbound requests
///
/// `generation` increases by one on every refresh, which lets a request that
/// failed with a superseded credential skip re-authenticating.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub generation: u64,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    fn is_expiring(&self) -> bool {
        self.expires_at
            .map(|at| at - ChronoDuration::seconds(EXPIRY_MARGIN_SECS) <= Utc::now())
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("generation", &self.generation)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// States of one logical request
#[derive(Debug)]
enum CallState<T> {
    Sending,
    AuthExpired { generation: u64 },
    Reauthenticating { generation: u64 },
    Retrying(Credential),
    Done(T),
    Failed(Error),
}

/// Shared credential plus the procedure to renew it
pub struct AuthSession {
    authenticator: Arc<dyn Authenticator>,
    current: RwLock<Credential>,
    reauth_count: AtomicU64,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("reauth_count", &self.reauth_count.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl AuthSession {
    /// Authenticate once and open a session around the resulting token
    pub async fn login(authenticator: Arc<dyn Authenticator>) -> Result<(Self, AuthToken)> {
        let token = authenticator.authenticate().await?;
        info!("Authenticated against identity service");

        let session = Self {
            authenticator,
            current: RwLock::new(Credential {
                token: token.token.clone(),
                generation: 1,
                expires_at: token.expires_at,
            }),
            reauth_count: AtomicU64::new(0),
        };
        Ok((session, token))
    }

    /// The credential requests should currently use
    pub async fn credential(&self) -> Credential {
        self.current.read().await.clone()
    }

    /// Number of re-authentications performed since login
    pub fn reauth_count(&self) -> u64 {
        self.reauth_count.load(Ordering::Relaxed)
    }

    /// Replace the credential with generation `stale`, unless another task already did
    pub async fn refresh(&self, stale: u64) -> Result<Credential> {
        let mut current = self.current.write().await;
        if current.generation != stale {
            debug!(
                "Credential generation {} already superseded by {}",
                stale, current.generation
            );
            return Ok(current.clone());
        }

        let token = self
            .authenticator
            .authenticate()
            .await
            .map_err(|e| Error::auth_failed(format!("Re-authentication failed: {}", e)))?;

        *current = Credential {
            token: token.token,
            generation: stale + 1,
            expires_at: token.expires_at,
        };
        self.reauth_count.fetch_add(1, Ordering::Relaxed);
        info!("Re-authenticated, credential generation {}", current.generation);
        Ok(current.clone())
    }

    /// Run `op` with the current credential, re-authenticating and retrying at most once
    pub async fn call<T, F, Fut>(&self, op: F) -> Result<T>
    where
        F: Fn(Credential) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T>> + Send,
        T: Send,
    {
        let mut state = CallState::Sending;

        loop {
            state = match state {
                CallState::Sending => {
                    let credential = self.credential().await;
                    // A proactive refresh spends this request's single retry.
                    if credential.is_expiring() {
                        debug!("Credential is about to expire, refreshing before sending");
                        CallState::Reauthenticating {
                            generation: credential.generation,
                        }
                    } else {
                        let generation = credential.generation;
                        match op(credential).await {
                            Ok(value) => CallState::Done(value),
                            Err(e) if e.is_auth_expired() => CallState::AuthExpired { generation },
                            Err(e) => CallState::Failed(e),
                        }
                    }
                }
                CallState::AuthExpired { generation } => {
                    warn!("Authorization expired (credential generation {})", generation);
                    CallState::Reauthenticating { generation }
                }
                CallState::Reauthenticating { generation } => match self.refresh(generation).await {
                    Ok(credential) => CallState::Retrying(credential),
                    Err(e) => CallState::Failed(e),
                },
                CallState::Retrying(credential) => match op(credential).await {
                    Ok(value) => CallState::Done(value),
                    Err(e) if e.is_auth_expired() => CallState::Failed(Error::auth_failed(format!(
                        "Still unauthorized after re-authentication: {}",
                        e
                    ))),
                    Err(e) => CallState::Failed(e),
                },
                CallState::Done(value) => return Ok(value),
                CallState::Failed(e) => return Err(e),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// Hands out "token-1", "token-2", ... and can be told to fail
    struct SequenceAuthenticator {
        issued: AtomicUsize,
        fail_after: Option<usize>,
    }

    impl SequenceAuthenticator {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                issued: AtomicUsize::new(0),
                fail_after: None,
            })
        }

        fn failing_after(n: usize) -> Arc<Self> {
            Arc::new(Self {
                issued: AtomicUsize::new(0),
                fail_after: Some(n),
            })
        }

        fn issued(&self) -> usize {
            self.issued.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Authenticator for SequenceAuthenticator {
        async fn authenticate(&self) -> Result<AuthToken> {
            let issued = self.issued.load(Ordering::SeqCst);
            if self.fail_after.is_some_and(|n| issued >= n) {
                return Err(Error::auth_failed("identity service rejected credentials"));
            }
            let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(AuthToken::new(format!("token-{}", n)))
        }
    }

    async fn session(authenticator: Arc<SequenceAuthenticator>) -> AuthSession {
        let (session, token) = AuthSession::login(authenticator).await.unwrap();
        assert_eq!(token.token, "token-1");
        session
    }

    #[tokio::test]
    async fn test_success_without_retry() {
        let authenticator = SequenceAuthenticator::new();
        let session = session(authenticator.clone()).await;
        let calls = AtomicUsize::new(0);

        let value = session
            .call(|credential| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move { Ok(credential.token) }
            })
            .await
            .unwrap();

        assert_eq!(value, "token-1");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(authenticator.issued(), 1);
        assert_eq!(session.reauth_count(), 0);
    }

    #[tokio::test]
    async fn test_expiry_triggers_one_reauth_and_one_retry() {
        let authenticator = SequenceAuthenticator::new();
        let session = session(authenticator.clone()).await;
        let seen = Mutex::new(Vec::new());

        let value = session
            .call(|credential| {
                seen.lock().unwrap().push(credential.token.clone());
                async move {
                    if credential.token == "token-1" {
                        Err(Error::auth_expired("401"))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(*seen.lock().unwrap(), vec!["token-1", "token-2"]);
        assert_eq!(authenticator.issued(), 2);
        assert_eq!(session.reauth_count(), 1);
        assert_eq!(session.credential().await.generation, 2);
    }

    #[tokio::test]
    async fn test_second_expiry_fails_without_further_retry() {
        let authenticator = SequenceAuthenticator::new();
        let session = session(authenticator.clone()).await;
        let calls = AtomicUsize::new(0);

        let err = session
            .call(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(Error::auth_expired("401")) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::AuthFailed(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(session.reauth_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_reauth_surfaces_without_retry() {
        let authenticator = SequenceAuthenticator::failing_after(1);
        let session = session(authenticator.clone()).await;
        let calls = AtomicUsize::new(0);

        let err = session
            .call(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(Error::auth_expired("401")) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::AuthFailed(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.reauth_count(), 0);
    }

    #[tokio::test]
    async fn test_other_errors_are_not_retried() {
        let session = session(SequenceAuthenticator::new()).await;
        let calls = AtomicUsize::new(0);

        let err = session
            .call(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(Error::transport("connection refused")) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_superseded_generation_skips_reauth() {
        let authenticator = SequenceAuthenticator::new();
        let session = session(authenticator.clone()).await;

        let first = session.refresh(1).await.unwrap();
        assert_eq!(first.generation, 2);

        // A second task that also failed with generation 1 reuses the new credential.
        let second = session.refresh(1).await.unwrap();
        assert_eq!(second, first);
        assert_eq!(authenticator.issued(), 2);
        assert_eq!(session.reauth_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_expiry_reauthenticates_once() {
        let authenticator = SequenceAuthenticator::new();
        let session = Arc::new(session(authenticator.clone()).await);

        let op = |credential: Credential| async move {
            if credential.generation == 1 {
                Err(Error::auth_expired("401"))
            } else {
                Ok(credential.generation)
            }
        };

        let (a, b) = tokio::join!(session.call(op), session.call(op));
        assert_eq!(a.unwrap(), 2);
        assert_eq!(b.unwrap(), 2);
        assert_eq!(authenticator.issued(), 2);
    }

    #[tokio::test]
    async fn test_expiring_credential_refreshed_before_send() {
        struct ShortLived;

        #[async_trait]
        impl Authenticator for ShortLived {
            async fn authenticate(&self) -> Result<AuthToken> {
                let mut token = AuthToken::new("short");
                token.expires_at = Some(Utc::now());
                Ok(token)
            }
        }

        let (session, _) = AuthSession::login(Arc::new(ShortLived)).await.unwrap();
        let generation = session.call(|c| async move { Ok(c.generation) }).await.unwrap();

        assert_eq!(generation, 2);
        assert_eq!(session.reauth_count(), 1);
    }

    #[tokio::test]
    async fn test_expired_after_refresh_before_send_is_not_retried() {
        struct ShortLived;

        #[async_trait]
        impl Authenticator for ShortLived {
            async fn authenticate(&self) -> Result<AuthToken> {
                let mut token = AuthToken::new("short");
                token.expires_at = Some(Utc::now());
                Ok(token)
            }
        }

        let (session, _) = AuthSession::login(Arc::new(ShortLived)).await.unwrap();
        let calls = AtomicUsize::new(0);

        let err = session
            .call(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(Error::auth_expired("401")) }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, Error::AuthFailed(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(session.reauth_count(), 1);
    }

    #[test]
    fn test_credential_debug_redacts_token() {
        let credential = Credential {
            token: "secret".to_string(),
            generation: 1,
            expires_at: None,
        };
        assert!(!format!("{:?}", credential).contains("secret"));
    }
}
