use bazaar_core::FulfillmentError;
use chrono::{DateTime, Duration, Utc};
use std::future::Future;
use tokio::sync::Mutex;

/// A token handed to one request, tagged with the login that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    pub value: String,
    pub generation: u64,
}

#[derive(Default)]
struct SessionState {
    current: Option<(SessionToken, DateTime<Utc>)>,
    logins: u64,
}

/// Process-wide courier login. Callers racing on an expired or rejected token
/// queue on one mutex, so only the first performs the login and the rest
/// reuse its result.
pub struct CourierSession {
    state: Mutex<SessionState>,
    ttl: Duration,
}

impl CourierSession {
    pub fn new(ttl: Duration) -> Self {
        Self {
            state: Mutex::new(SessionState::default()),
            ttl,
        }
    }

    pub async fn token<F, Fut>(&self, login: F) -> Result<SessionToken, FulfillmentError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, FulfillmentError>>,
    {
        let mut state = self.state.lock().await;
        if let Some((token, expires_at)) = &state.current {
            if *expires_at > Utc::now() {
                return Ok(token.clone());
            }
        }

        let value = login().await?;
        state.logins += 1;
        let token = SessionToken {
            value,
            generation: state.logins,
        };
        state.current = Some((token.clone(), Utc::now() + self.ttl));
        tracing::info!(generation = token.generation, "Courier session established");
        Ok(token)
    }

    /// Forget the token only if it is still the one that failed; a newer
    /// login by a concurrent caller is kept.
    pub async fn invalidate(&self, generation: u64) {
        let mut state = self.state.lock().await;
        if matches!(&state.current, Some((token, _)) if token.generation == generation) {
            state.current = None;
        }
    }

    pub async fn logins(&self) -> u64 {
        self.state.lock().await.logins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_token_is_cached() {
        let session = CourierSession::new(Duration::hours(1));
        let calls = AtomicUsize::new(0);
        for _ in 0..3 {
            let token = session
                .token(|| async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok("t1".to_string())
                })
                .await
                .unwrap();
            assert_eq!(token.value, "t1");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_token_is_refreshed() {
        let session = CourierSession::new(Duration::seconds(-1));
        session.token(|| async { Ok("a".to_string()) }).await.unwrap();
        let second = session.token(|| async { Ok("b".to_string()) }).await.unwrap();
        assert_eq!(second.value, "b");
        assert_eq!(second.generation, 2);
    }

    #[tokio::test]
    async fn test_stale_invalidation_keeps_newer_token() {
        let session = CourierSession::new(Duration::hours(1));
        let first = session.token(|| async { Ok("a".to_string()) }).await.unwrap();
        session.invalidate(first.generation).await;
        let second = session.token(|| async { Ok("b".to_string()) }).await.unwrap();

        // A slow caller still holding generation 1 must not discard "b".
        session.invalidate(first.generation).await;
        let third = session.token(|| async { Ok("c".to_string()) }).await.unwrap();
        assert_eq!(third, second);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_login() {
        let session = Arc::new(CourierSession::new(Duration::hours(1)));
        let calls = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let session = Arc::clone(&session);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                session
                    .token(|| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                        Ok("shared".to_string())
                    })
                    .await
                    .unwrap()
            }));
        }
        for h in handles {
            assert_eq!(h.await.unwrap().value, "shared");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_login_is_not_cached() {
        let session = CourierSession::new(Duration::hours(1));
        let err = session
            .token(|| async { Err(FulfillmentError::Unauthorized) })
            .await
            .unwrap_err();
        assert!(matches!(err, FulfillmentError::Unauthorized));
        assert_eq!(session.logins().await, 0);
    }
}
