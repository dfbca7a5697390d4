//! Pacing between provider calls.

use std::time::Duration;

use weather_provider::ProviderError;

/// Fixed delays applied after each provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottlePolicy {
    pub throttle: Duration,
    pub failure_backoff: Duration,
    pub rate_limit_backoff: Duration,
}

impl ThrottlePolicy {
    /// Delay for the outcome of one call.
    pub fn delay_after(&self, outcome: Result<(), &ProviderError>) -> Duration {
        match outcome {
            Ok(()) => self.throttle,
            Err(e) if e.is_rate_limited() => self.rate_limit_backoff,
            Err(_) => self.failure_backoff,
        }
    }

    /// Sleep for the outcome of one call.
    pub async fn pause(&self, outcome: Result<(), &ProviderError>) {
        let delay = self.delay_after(outcome);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_classification() {
        let policy = ThrottlePolicy {
            throttle: Duration::from_millis(250),
            failure_backoff: Duration::from_secs(2),
            rate_limit_backoff: Duration::from_secs(5),
        };
        assert_eq!(policy.delay_after(Ok(())), Duration::from_millis(250));
        assert_eq!(
            policy.delay_after(Err(&ProviderError::RateLimited)),
            Duration::from_secs(5)
        );
        assert_eq!(
            policy.delay_after(Err(&ProviderError::Network("reset".into()))),
            Duration::from_secs(2)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_sleeps_backoff() {
        let policy = ThrottlePolicy {
            throttle: Duration::ZERO,
            failure_backoff: Duration::from_secs(2),
            rate_limit_backoff: Duration::from_secs(5),
        };
        let start = tokio::time::Instant::now();
        policy.pause(Err(&ProviderError::RateLimited)).await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(5) && elapsed < Duration::from_secs(6));
    }
}
