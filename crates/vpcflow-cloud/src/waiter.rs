//! Bounded and unbounded status polling

use std::future::Future;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempts {
    Bounded(u32),
    Unbounded,
}

impl Attempts {
    /// `0` means unbounded
    pub fn from_count(count: u32) -> Self {
        if count == 0 {
            Attempts::Unbounded
        } else {
            Attempts::Bounded(count)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub attempts: Attempts,
}

impl PollPolicy {
    pub fn bounded(interval: Duration, attempts: u32) -> Self {
        Self {
            interval,
            attempts: Attempts::Bounded(attempts.max(1)),
        }
    }

    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            attempts: Attempts::Unbounded,
        }
    }

    /// Replace interval and/or attempt budget
    pub fn with_override(mut self, interval_secs: Option<u64>, max_attempts: Option<u32>) -> Self {
        if let Some(secs) = interval_secs {
            self.interval = Duration::from_secs(secs);
        }
        if let Some(count) = max_attempts {
            self.attempts = Attempts::from_count(count);
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome<T> {
    Ready(T),
    TimedOut { attempts: u32 },
}

/// Poll `probe` until it reports readiness
///
/// The probe receives the 1-based attempt number and returns `Some` once
/// the awaited state is reached. It is called immediately, then once per
/// interval. Errors from the probe end the wait.
pub async fn wait_for<T, E, F, Fut>(
    subject: &str,
    policy: &PollPolicy,
    mut probe: F,
) -> Result<WaitOutcome<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    let mut attempt: u32 = 0;
    loop {
        attempt = attempt.saturating_add(1);
        if let Some(value) = probe(attempt).await? {
            debug!(subject, attempt, "Wait condition reached");
            return Ok(WaitOutcome::Ready(value));
        }

        if let Attempts::Bounded(max) = policy.attempts {
            if attempt >= max {
                return Ok(WaitOutcome::TimedOut { attempts: attempt });
            }
        }

        debug!(
            subject,
            attempt,
            interval_secs = policy.interval.as_secs(),
            "Still waiting"
        );
        tokio::time::sleep(policy.interval).await;
    }
}

/// Poll policies for every wait the executor performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitSettings {
    pub subnet_available: PollPolicy,
    pub subnet_deleted: PollPolicy,
    pub instance_running: PollPolicy,
    pub instance_stopped: PollPolicy,
    pub instance_deleted: PollPolicy,
    pub floating_ip_available: PollPolicy,
    pub vpn_gateway_available: PollPolicy,
    pub vpn_gateway_deleted: PollPolicy,
    pub load_balancer_deleted: PollPolicy,
}

impl Default for WaitSettings {
    fn default() -> Self {
        let secs = Duration::from_secs;
        Self {
            subnet_available: PollPolicy::bounded(secs(5), 12),
            subnet_deleted: PollPolicy::unbounded(secs(10)),
            instance_running: PollPolicy::unbounded(secs(5)),
            instance_stopped: PollPolicy::unbounded(secs(5)),
            instance_deleted: PollPolicy::unbounded(secs(5)),
            floating_ip_available: PollPolicy::unbounded(secs(10)),
            vpn_gateway_available: PollPolicy::unbounded(secs(10)),
            vpn_gateway_deleted: PollPolicy::unbounded(secs(30)),
            load_balancer_deleted: PollPolicy::unbounded(secs(30)),
        }
    }
}

impl WaitSettings {
    /// Same policy for every wait
    pub fn uniform(policy: PollPolicy) -> Self {
        Self {
            subnet_available: policy,
            subnet_deleted: policy,
            instance_running: policy,
            instance_stopped: policy,
            instance_deleted: policy,
            floating_ip_available: policy,
            vpn_gateway_available: policy,
            vpn_gateway_deleted: policy,
            load_balancer_deleted: policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test]
    async fn test_ready_after_some_attempts() {
        let calls = Cell::new(0);
        let policy = PollPolicy::unbounded(Duration::ZERO);

        let outcome: Result<_, ()> = wait_for("subnet", &policy, |attempt| {
            calls.set(calls.get() + 1);
            async move { Ok((attempt == 3).then_some("available")) }
        })
        .await;

        assert_eq!(outcome, Ok(WaitOutcome::Ready("available")));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn test_bounded_wait_times_out() {
        let policy = PollPolicy::bounded(Duration::ZERO, 4);
        let outcome: Result<WaitOutcome<()>, ()> =
            wait_for("subnet", &policy, |_| async { Ok(None) }).await;
        assert_eq!(outcome, Ok(WaitOutcome::TimedOut { attempts: 4 }));
    }

    #[tokio::test]
    async fn test_readiness_error_ends_wait() {
        let policy = PollPolicy::unbounded(Duration::ZERO);
        let outcome: Result<WaitOutcome<()>, &str> =
            wait_for("instance", &policy, |_| async { Err("boom") }).await;
        assert_eq!(outcome, Err("boom"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleeps_between_attempts() {
        let policy = PollPolicy::bounded(Duration::from_secs(5), 3);
        let started = tokio::time::Instant::now();
        let _: Result<WaitOutcome<()>, ()> =
            wait_for("subnet", &policy, |_| async { Ok(None) }).await;
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[test]
    fn test_override() {
        let policy = PollPolicy::unbounded(Duration::from_secs(5)).with_override(Some(1), Some(3));
        assert_eq!(policy.interval, Duration::from_secs(1));
        assert_eq!(policy.attempts, Attempts::Bounded(3));

        let unbounded = policy.with_override(None, Some(0));
        assert_eq!(unbounded.attempts, Attempts::Unbounded);
    }

    #[test]
    fn test_default_subnet_wait_is_bounded() {
        let waits = WaitSettings::default();
        assert_eq!(waits.subnet_available.attempts, Attempts::Bounded(12));
        assert_eq!(waits.instance_stopped.attempts, Attempts::Unbounded);
    }
}
