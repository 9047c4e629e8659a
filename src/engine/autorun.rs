use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;

use crate::engine::simulation::RunHandle;
use crate::error::{RunError, RunResult};
use crate::types::{RunStatus, TickResult};

const MIN_INTERVAL: Duration = Duration::from_millis(1);
const EVENT_CAPACITY: usize = 64;

/// Why a pacing loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutorunExit {
    Disabled,
    RunStopped,
    RunComplete,
    BudgetExhausted,
}

#[derive(Debug, Clone)]
pub enum AutorunEvent {
    Ticked(TickResult),
    TickFailed { error: RunError },
    Finished(AutorunExit),
}

struct PacingLoop {
    token: CancellationToken,
    handle: JoinHandle<AutorunExit>,
}

/// Issues ticks against one run at a fixed cadence until the run leaves
/// `RUNNING`, the request cap is hit, or the controller is disabled.
///
/// Cancellation is checked between ticks only; a tick in flight always
/// finishes.
pub struct AutorunController {
    run: RunHandle,
    events: broadcast::Sender<AutorunEvent>,
    active: Mutex<Option<PacingLoop>>,
}

impl AutorunController {
    pub fn new(run: RunHandle) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            run,
            events,
            active: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> BroadcastStream<AutorunEvent> {
        BroadcastStream::new(self.events.subscribe())
    }

    /// Starts pacing. Replaces the run's request cap with `max_requests` and
    /// restarts the loop if one is already active.
    pub async fn enable(&self, period: Duration, max_requests: u64) -> RunResult<()> {
        let status = self.run.get_status().await.status;
        if status != RunStatus::Running {
            return Err(RunError::InvalidTransition {
                from: status,
                operation: "enable autorun",
            });
        }

        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            previous.token.cancel();
            let _ = previous.handle.await;
        }

        self.run.set_max_requests(Some(max_requests)).await;
        self.run.set_autorun_enabled(true).await;

        let period = period.max(MIN_INTERVAL);
        let token = CancellationToken::new();
        let handle = tokio::spawn(pace(
            self.run.clone(),
            period,
            token.clone(),
            self.events.clone(),
        ));
        *active = Some(PacingLoop { token, handle });

        log::info!(
            "Autorun enabled for run {} every {:?}, cap {} requests",
            self.run.id(),
            period,
            max_requests
        );
        Ok(())
    }

    /// Stops pacing and returns why the loop ended, if one was active.
    pub async fn disable(&self) -> Option<AutorunExit> {
        let mut active = self.active.lock().await;
        let exit = match active.take() {
            Some(pacing) => {
                pacing.token.cancel();
                pacing.handle.await.ok()
            }
            None => None,
        };
        self.run.set_autorun_enabled(false).await;
        exit
    }

    /// Waits for the active loop to end on its own.
    pub async fn wait(&self) -> Option<AutorunExit> {
        let mut active = self.active.lock().await;
        match active.take() {
            Some(pacing) => pacing.handle.await.ok(),
            None => None,
        }
    }

    pub async fn is_active(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|pacing| !pacing.handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for AutorunController {
    fn drop(&mut self) {
        if let Some(pacing) = self.active.get_mut().take() {
            pacing.token.cancel();
        }
    }
}

async fn pace(
    run: RunHandle,
    period: Duration,
    token: CancellationToken,
    events: broadcast::Sender<AutorunEvent>,
) -> AutorunExit {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first interval tick completes immediately.
    ticker.tick().await;

    let exit = loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break AutorunExit::Disabled,
            _ = ticker.tick() => {}
        }

        match run.tick().await {
            Ok(result) => {
                let complete = result.status == RunStatus::Complete;
                let _ = events.send(AutorunEvent::Ticked(result));
                if complete {
                    break AutorunExit::RunComplete;
                }
            }
            Err(error) if error.is_budget_exceeded() => {
                log::warn!("Autorun for run {} halted: {}", run.id(), error);
                let _ = events.send(AutorunEvent::TickFailed { error });
                break AutorunExit::BudgetExhausted;
            }
            Err(RunError::InvalidTransition {
                from: RunStatus::Complete,
                ..
            }) => break AutorunExit::RunComplete,
            Err(RunError::InvalidTransition { .. }) => break AutorunExit::RunStopped,
            Err(error) => {
                log::warn!("Autorun tick for run {} failed: {}", run.id(), error);
                let _ = events.send(AutorunEvent::TickFailed { error });
            }
        }
    };

    run.set_autorun_enabled(false).await;
    log::info!("Autorun for run {} finished: {:?}", run.id(), exit);
    let _ = events.send(AutorunEvent::Finished(exit));
    exit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::simulation::{EngineConfig, Simulation};
    use crate::providers::StubProvider;
    use crate::types::{Agent, AgentRole, Link, RunSpec};
    use std::sync::Arc;

    fn create_test_run(links: Vec<Link>) -> RunHandle {
        let spec = RunSpec::new(
            vec![
                Agent::new("a", AgentRole::Orchestrator, "stub"),
                Agent::new("b", AgentRole::Worker, "stub"),
            ],
            links,
            "a",
            "hello",
        );
        Simulation::configure(spec, Arc::new(StubProvider::new()), EngineConfig::default())
            .unwrap()
    }

    #[tokio::test]
    async fn test_enable_requires_running() {
        let run = create_test_run(vec![Link::new("a", "b")]);
        let autorun = AutorunController::new(run.clone());

        let err = autorun
            .enable(Duration::from_millis(10), 5)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            RunError::InvalidTransition {
                from: RunStatus::Configured,
                operation: "enable autorun",
            }
        );
        assert!(!autorun.is_active().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_until_complete() {
        let run = create_test_run(vec![Link::new("a", "b")]);
        run.start().await.unwrap();

        let autorun = AutorunController::new(run.clone());
        autorun.enable(Duration::from_millis(100), 10).await.unwrap();
        assert!(run.get_status().await.autorun_enabled);

        assert_eq!(autorun.wait().await, Some(AutorunExit::RunComplete));

        let status = run.get_status().await;
        assert_eq!(status.status, RunStatus::Complete);
        assert_eq!(status.current_tick, 1);
        assert!(!status.autorun_enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disable_is_idempotent() {
        let run = create_test_run(vec![Link::new("a", "b"), Link::new("b", "a")]);
        run.start().await.unwrap();

        let autorun = AutorunController::new(run.clone());
        autorun.enable(Duration::from_secs(60), 100).await.unwrap();

        assert_eq!(autorun.disable().await, Some(AutorunExit::Disabled));
        assert_eq!(autorun.disable().await, None);
        assert_eq!(run.get_status().await.status, RunStatus::Running);
    }
}
