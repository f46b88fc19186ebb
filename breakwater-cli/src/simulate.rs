//! Scripted replay of call outcomes against a breaker on a manual clock

use anyhow::{bail, Context, Result};
use breakwater_breaker::{
    BreakerConfig, BreakerMetrics, CallError, CircuitBreaker, CircuitState, ManualClock,
    TracingListener, TripPolicy,
};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Script equivalent to the canonical walk through every state
pub(crate) const DEFAULT_SCRIPT: &str = "fail,fail,wait:2s,ok,wait:4s,ok";

/// One scripted action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Attempt a call that succeeds if admitted
    Ok,
    /// Attempt a call that fails if admitted
    Fail,
    /// Advance the clock
    Wait(Duration),
    /// Evaluate the reset timeout without calling
    Check,
}

impl FromStr for Step {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let token = s.trim();
        match token.to_lowercase().as_str() {
            "ok" | "success" => return Ok(Step::Ok),
            "fail" | "failure" | "err" => return Ok(Step::Fail),
            "check" => return Ok(Step::Check),
            _ => {}
        }

        match token.split_once(':') {
            Some(("wait", duration)) => {
                let duration = humantime::parse_duration(duration.trim())
                    .with_context(|| format!("invalid wait duration in step '{token}'"))?;
                Ok(Step::Wait(duration))
            }
            _ => bail!("unknown step '{token}' (expected ok, fail, check or wait:<duration>)"),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Ok => write!(f, "ok"),
            Step::Fail => write!(f, "fail"),
            Step::Wait(d) => write!(f, "wait:{}", humantime::format_duration(*d)),
            Step::Check => write!(f, "check"),
        }
    }
}

/// Parse a comma separated script
pub(crate) fn parse_script(script: &str) -> Result<Vec<Step>> {
    script
        .split(',')
        .filter(|token| !token.trim().is_empty())
        .map(str::parse)
        .collect()
}

/// Parse a trip policy from `single`, `consecutive:<n>` or `rate:<ratio>:<min>`
pub(crate) fn parse_policy(s: &str) -> Result<TripPolicy> {
    let parts: Vec<&str> = s.trim().split(':').map(str::trim).collect();
    let policy = match parts.as_slice() {
        ["single"] => TripPolicy::SingleFailure,
        ["consecutive", threshold] => TripPolicy::ConsecutiveFailures {
            threshold: threshold
                .parse()
                .with_context(|| format!("invalid failure threshold '{threshold}'"))?,
        },
        ["rate", threshold, min_requests] => TripPolicy::FailureRate {
            threshold: threshold
                .parse()
                .with_context(|| format!("invalid failure rate '{threshold}'"))?,
            min_requests: min_requests
                .parse()
                .with_context(|| format!("invalid minimum request count '{min_requests}'"))?,
        },
        _ => bail!("unknown policy '{s}' (expected single, consecutive:<n> or rate:<ratio>:<min>)"),
    };
    policy.validate()?;
    Ok(policy)
}

/// What happened at one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StepOutcome {
    Succeeded,
    Failed,
    Rejected { remaining: Duration },
    Waited { elapsed: Duration },
    Checked { remaining: Option<Duration> },
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Succeeded => write!(f, "call succeeded"),
            StepOutcome::Failed => write!(f, "call failed"),
            StepOutcome::Rejected { remaining } => write!(
                f,
                "call rejected, retry in {}",
                humantime::format_duration(*remaining)
            ),
            StepOutcome::Waited { elapsed } => {
                write!(f, "clock at t+{}", humantime::format_duration(*elapsed))
            }
            StepOutcome::Checked { remaining: Some(d) } => {
                write!(f, "still open, {} left", humantime::format_duration(*d))
            }
            StepOutcome::Checked { remaining: None } => write!(f, "not open"),
        }
    }
}

/// Result of replaying a whole script
#[derive(Debug)]
pub(crate) struct Report {
    pub(crate) rows: Vec<(Step, StepOutcome, CircuitState)>,
    pub(crate) metrics: BreakerMetrics,
}

#[derive(Debug)]
struct SimulatedOutage;

impl fmt::Display for SimulatedOutage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "simulated dependency failure")
    }
}

/// Replay `steps` against a fresh breaker
pub(crate) async fn run(
    name: &str,
    config: BreakerConfig,
    steps: &[Step],
    verbose: bool,
) -> Result<Report> {
    let clock = ManualClock::new();
    let mut builder = CircuitBreaker::builder(name)
        .config(config)
        .clock(Arc::new(clock.clone()));
    if verbose {
        builder = builder.listener(Arc::new(TracingListener));
    }
    let breaker = builder.build()?;

    let mut rows = Vec::with_capacity(steps.len());
    for step in steps {
        let outcome = match step {
            Step::Ok => classify(
                breaker
                    .call(|| async { Ok::<_, SimulatedOutage>(()) })
                    .await,
            ),
            Step::Fail => classify(
                breaker
                    .call(|| async { Err::<(), _>(SimulatedOutage) })
                    .await,
            ),
            Step::Wait(duration) => {
                clock.advance(*duration);
                StepOutcome::Waited {
                    elapsed: clock.elapsed(),
                }
            }
            Step::Check => StepOutcome::Checked {
                remaining: breaker.check_timeout(),
            },
        };
        rows.push((*step, outcome, breaker.current_state()));
    }

    Ok(Report {
        rows,
        metrics: breaker.metrics(),
    })
}

fn classify(result: Result<(), CallError<SimulatedOutage>>) -> StepOutcome {
    match result {
        Ok(()) => StepOutcome::Succeeded,
        Err(CallError::Inner(_)) => StepOutcome::Failed,
        Err(CallError::Rejected(open)) => StepOutcome::Rejected {
            remaining: open.remaining,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_script() {
        let steps = parse_script("ok, fail ,wait:1500ms,check,").unwrap();
        assert_eq!(
            steps,
            vec![
                Step::Ok,
                Step::Fail,
                Step::Wait(Duration::from_millis(1500)),
                Step::Check
            ]
        );
        assert!(parse_script("ok,explode").is_err());
        assert!(parse_script("wait:soon").is_err());
    }

    #[test]
    fn test_parse_policy() {
        assert_eq!(parse_policy("single").unwrap(), TripPolicy::SingleFailure);
        assert_eq!(
            parse_policy("consecutive:3").unwrap(),
            TripPolicy::ConsecutiveFailures { threshold: 3 }
        );
        assert_eq!(
            parse_policy("rate:0.5:10").unwrap(),
            TripPolicy::FailureRate {
                threshold: 0.5,
                min_requests: 10
            }
        );
        assert!(parse_policy("consecutive:0").is_err());
        assert!(parse_policy("rate:1.5:10").is_err());
        assert!(parse_policy("sometimes").is_err());
    }

    #[test]
    fn test_step_display_round_trips() {
        let step = Step::Wait(Duration::from_secs(2));
        assert_eq!(step.to_string(), "wait:2s");
        assert_eq!(step.to_string().parse::<Step>().unwrap(), step);
    }

    #[tokio::test]
    async fn test_default_script_walks_every_state() {
        let steps = parse_script(DEFAULT_SCRIPT).unwrap();
        let report = run("demo", BreakerConfig::default(), &steps, false)
            .await
            .unwrap();

        let states: Vec<_> = report.rows.iter().map(|(_, _, state)| *state).collect();
        assert_eq!(
            states,
            vec![
                CircuitState::HalfOpen,
                CircuitState::Open,
                CircuitState::Open,
                CircuitState::Open,
                CircuitState::Open,
                CircuitState::Closed,
            ]
        );
        assert_eq!(
            report.rows[3].1,
            StepOutcome::Rejected {
                remaining: Duration::from_secs(3)
            }
        );
        assert_eq!(report.metrics.rejected, 1);
    }

    #[tokio::test]
    async fn test_threshold_policy_script() {
        let steps = parse_script("fail,fail,check").unwrap();
        let config = BreakerConfig::default()
            .with_policy(TripPolicy::ConsecutiveFailures { threshold: 3 });
        let report = run("demo", config, &steps, false).await.unwrap();

        assert_eq!(report.rows[2].1, StepOutcome::Checked { remaining: None });
        assert_eq!(report.metrics.state, CircuitState::Closed);
    }
}
