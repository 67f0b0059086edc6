//! Pre-loop beam connectivity check
//!
//! Before monitoring starts both beams must reach their photodiodes. The
//! check is retried with exponential backoff up to a fixed budget; running
//! out of attempts is fatal. The watchdog is kept alive throughout.

use crate::domain::event::MonitorEvent;
use crate::domain::types::SensorPair;
use crate::infra::config::Config;
use crate::io::ports::{LivenessPort, SensorPort};
use std::fmt;
use std::time::Duration;
use tokio::time::{sleep, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.connectivity_max_attempts(),
            initial_backoff: config.connectivity_initial_backoff(),
            max_backoff: config.connectivity_max_backoff(),
        }
    }

    /// Delay after failed attempt `attempt` (1-based): doubles each time, capped
    pub fn backoff(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(1u32 << shift).min(self.max_backoff)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectivityError {
    /// Beams never both reported clear
    Exhausted { attempts: u32, last_pair: Option<SensorPair> },
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectivityError::Exhausted { attempts, last_pair: Some(pair) } => write!(
                f,
                "beams not clear after {} attempts (left={}, right={})",
                attempts,
                pair.left.as_str(),
                pair.right.as_str()
            ),
            ConnectivityError::Exhausted { attempts, last_pair: None } => {
                write!(f, "beams unreadable after {} attempts", attempts)
            }
        }
    }
}

impl std::error::Error for ConnectivityError {}

/// Wait until both beams report clear.
///
/// Returns the number of attempts used. Every attempt, successful or not,
/// is reported through `emit`.
pub async fn await_clear_beams<S, L, F>(
    sensors: &mut S,
    liveness: &mut L,
    policy: &RetryPolicy,
    mut emit: F,
) -> Result<u32, ConnectivityError>
where
    S: SensorPort,
    L: LivenessPort,
    F: FnMut(MonitorEvent),
{
    let mut last_pair = None;

    for attempt in 1..=policy.max_attempts {
        acknowledge(liveness, &mut emit);

        match sensors.read_pair() {
            Ok(pair) if pair.all_clear() => {
                emit(MonitorEvent::BeamsConnected { attempts: attempt });
                return Ok(attempt);
            }
            Ok(pair) => {
                last_pair = Some(pair);
                emit(MonitorEvent::BeamsNotClear { attempt, pair });
            }
            Err(e) => {
                emit(MonitorEvent::SensorFault { error: format!("{e:#}") });
            }
        }

        if attempt < policy.max_attempts {
            sleep_alive(policy.backoff(attempt), liveness, &mut emit).await;
        }
    }

    emit(MonitorEvent::ConnectivityExhausted { attempts: policy.max_attempts });
    Err(ConnectivityError::Exhausted { attempts: policy.max_attempts, last_pair })
}

/// Sleep for `total`, waking at least twice per watchdog interval
async fn sleep_alive<L, F>(total: Duration, liveness: &mut L, emit: &mut F)
where
    L: LivenessPort,
    F: FnMut(MonitorEvent),
{
    let slice = Duration::from_secs(u64::from((liveness.timeout_secs() / 2).max(1)));
    let deadline = Instant::now() + total;

    loop {
        let now = Instant::now();
        if now >= deadline {
            return;
        }
        sleep((deadline - now).min(slice)).await;
        acknowledge(liveness, emit);
    }
}

fn acknowledge<L: LivenessPort, F: FnMut(MonitorEvent)>(liveness: &mut L, emit: &mut F) {
    if let Err(e) = liveness.acknowledge() {
        emit(MonitorEvent::LivenessFault { error: format!("{e:#}") });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{BeamSide, BeamState};
    use std::collections::VecDeque;

    struct ScriptedPairs(VecDeque<anyhow::Result<SensorPair>>);

    impl SensorPort for ScriptedPairs {
        fn read(&mut self, _side: BeamSide) -> anyhow::Result<BeamState> {
            unreachable!("read_pair is overridden")
        }

        fn read_pair(&mut self) -> anyhow::Result<SensorPair> {
            self.0.pop_front().unwrap_or(Ok(SensorPair::CLEAR))
        }
    }

    #[derive(Default)]
    struct CountingLiveness(u32);

    impl LivenessPort for CountingLiveness {
        fn acknowledge(&mut self) -> anyhow::Result<()> {
            self.0 += 1;
            Ok(())
        }

        fn timeout_secs(&self) -> u32 {
            15
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    fn blocked_left() -> SensorPair {
        SensorPair::new(BeamState::Blocked, BeamState::Clear)
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(16),
        };
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
        assert_eq!(policy.backoff(4), Duration::from_secs(16));
        assert_eq!(policy.backoff(10), Duration::from_secs(16));
        assert_eq!(policy.backoff(u32::MAX), Duration::from_secs(16));
    }

    #[tokio::test]
    async fn test_clear_on_first_attempt() {
        let mut sensors = ScriptedPairs(VecDeque::new());
        let mut liveness = CountingLiveness::default();
        let mut events = Vec::new();

        let attempts =
            await_clear_beams(&mut sensors, &mut liveness, &fast_policy(3), |e| events.push(e))
                .await
                .unwrap();

        assert_eq!(attempts, 1);
        assert_eq!(events, vec![MonitorEvent::BeamsConnected { attempts: 1 }]);
        assert!(liveness.0 >= 1);
    }

    #[tokio::test]
    async fn test_retries_until_clear() {
        let mut sensors = ScriptedPairs(VecDeque::from(vec![
            Ok(blocked_left()),
            Err(anyhow::anyhow!("gpio4 unreadable")),
            Ok(SensorPair::CLEAR),
        ]));
        let mut liveness = CountingLiveness::default();
        let mut events = Vec::new();

        let attempts =
            await_clear_beams(&mut sensors, &mut liveness, &fast_policy(5), |e| events.push(e))
                .await
                .unwrap();

        assert_eq!(attempts, 3);
        let names: Vec<_> = events.iter().map(MonitorEvent::name).collect();
        assert_eq!(names, vec!["beams_not_clear", "sensor_fault", "beams_connected"]);
        assert!(liveness.0 >= 3);
    }

    #[tokio::test]
    async fn test_exhausted_budget_is_fatal() {
        let mut sensors = ScriptedPairs((0..3).map(|_| Ok(blocked_left())).collect());
        let mut liveness = CountingLiveness::default();
        let mut events = Vec::new();

        let err =
            await_clear_beams(&mut sensors, &mut liveness, &fast_policy(3), |e| events.push(e))
                .await
                .unwrap_err();

        assert_eq!(
            err,
            ConnectivityError::Exhausted { attempts: 3, last_pair: Some(blocked_left()) }
        );
        assert_eq!(events.last(), Some(&MonitorEvent::ConnectivityExhausted { attempts: 3 }));
        assert_eq!(
            events.iter().filter(|e| matches!(e, MonitorEvent::BeamsNotClear { .. })).count(),
            3
        );
    }
}
