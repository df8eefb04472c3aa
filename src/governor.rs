use std::future::Future;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use governor::{
    Quota, RateLimiter, clock::DefaultClock, state::InMemoryState, state::direct::NotKeyed,
};

use crate::config::GovernorConfig;
use crate::ports::catalog::CatalogError;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error("Gave up after {attempts} attempts")]
    RetriesExhausted {
        attempts: usize,
        #[source]
        last: CatalogError,
    },
    #[error("Request quota exhausted")]
    QuotaExceeded(#[source] CatalogError),
    #[error("Request rejected")]
    Rejected(#[source] CatalogError),
}

/// Spaces out catalog calls and retries transient failures with exponential backoff.
///
/// Quota exhaustion and outright rejections are handed back immediately so the
/// caller can checkpoint instead of spinning against a hard limit.
pub struct RateGovernor {
    limiter: Option<DirectRateLimiter>,
    max_attempts: usize,
    base_delay: Duration,
    max_delay: Duration,
}

impl RateGovernor {
    pub fn new(config: &GovernorConfig) -> Self {
        let limiter = Quota::with_period(config.min_interval()).map(RateLimiter::direct);

        tracing::debug!(
            "Rate governor configured: min interval {:?}, {} attempts, backoff {:?}..{:?}",
            config.min_interval(),
            config.max_attempts,
            config.base_delay(),
            config.max_delay()
        );

        Self {
            limiter,
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
        }
    }

    fn backoff(&self) -> impl Iterator<Item = Duration> + use<> {
        let max_delay = self.max_delay;
        ExponentialBuilder::default()
            .with_min_delay(self.base_delay)
            .with_max_delay(self.max_delay)
            .with_max_times(self.max_attempts - 1)
            .with_jitter()
            .build()
            .map(move |delay| delay.min(max_delay))
    }

    /// Run `call` under the governor, retrying transient failures.
    pub async fn guard<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, GuardError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CatalogError>>,
    {
        let mut delays = self.backoff();
        let mut attempt = 0;

        loop {
            attempt += 1;
            if let Some(limiter) = &self.limiter {
                limiter.until_ready().await;
            }

            let error = match call().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            match error {
                CatalogError::Transient(_) => match delays.next() {
                    Some(delay) if attempt < self.max_attempts => {
                        tracing::warn!(
                            "{} failed (attempt {}/{}), retrying in {:?}: {}",
                            operation,
                            attempt,
                            self.max_attempts,
                            delay,
                            error
                        );
                        tokio::time::sleep(delay).await;
                    }
                    _ => {
                        tracing::error!(
                            "{} failed after {} attempts: {}",
                            operation,
                            attempt,
                            error
                        );
                        return Err(GuardError::RetriesExhausted {
                            attempts: attempt,
                            last: error,
                        });
                    }
                },
                CatalogError::QuotaExceeded(_) => {
                    tracing::warn!("{} hit the quota limit: {}", operation, error);
                    return Err(GuardError::QuotaExceeded(error));
                }
                CatalogError::Rejected(_) => {
                    tracing::error!("{} was rejected: {}", operation, error);
                    return Err(GuardError::Rejected(error));
                }
            }
        }
    }
}
