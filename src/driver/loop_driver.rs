//! The loop driver state machine.

use std::sync::Arc;

use super::{DriverConfig, LoopOptions, LoopReport};
use crate::breaker::evaluate;
use crate::domain::{DisplayState, ExitReason, LoopEvent, LoopPhase, LoopState, LoopStatus, LooprStatus};
use crate::error::{LooprError, Result};
use crate::prompt::build_loop_prompt;
use crate::protocol::parse_status_file;
use crate::scheduler::{Budget, RateLimiter};
use crate::session::{AgentRequest, AgentRunner, SessionRun, humanize_duration};
use crate::storage::{LoopLogEntry, StateStore};
use crate::workspace::{ensure_handoff, git_change_count};

/// Error recorded when an agent finished without a status block.
pub const MISSING_STATUS_ERROR: &str = "missing LOOPR_STATUS block";

/// Drives repeated agent sessions until a breaker or completion stops them.
pub struct LoopDriver<R, S>
where
    R: AgentRunner,
    S: StateStore,
{
    runner: Arc<R>,
    store: Arc<S>,
    config: DriverConfig,
}

/// What one invocation produced, before evaluation.
struct Invocation {
    run: Option<SessionRun>,
    status: LooprStatus,
    status_found: bool,
    /// Non-fatal invocation failure folded into the status
    error: Option<String>,
    /// Session could not be set up; returned after persisting
    fatal: Option<LooprError>,
}

impl<R, S> LoopDriver<R, S>
where
    R: AgentRunner,
    S: StateStore,
{
    pub fn new(runner: Arc<R>, store: Arc<S>, config: DriverConfig) -> Self {
        Self { runner, store, config }
    }

    /// Run until a terminal phase, returning the report.
    ///
    /// Persistence failures abort the run. A runner error is persisted like
    /// any other failed iteration and then returned, unless a breaker stopped
    /// the loop in that same iteration.
    pub async fn run(&self, options: &LoopOptions) -> Result<LoopReport> {
        let mut config = self.config.loop_config.clone();
        if let Some(max) = options.max_iterations.filter(|max| *max > 0) {
            config.max_iterations = max;
        }
        let limiter = RateLimiter::new(config.max_calls_per_hour);
        let handoff_path = ensure_handoff(&self.config.root, &self.config.handoff_path)?;

        let mut state = self.store.load_state()?;
        let mut report = LoopReport::default();
        log::info!(
            "Starting loop in {} at iteration {}",
            self.config.root.display(),
            state.iteration
        );

        loop {
            if config.iterations_exhausted(state.iteration) {
                let reason = ExitReason::MaxIterations;
                let status = LoopStatus::new(DisplayState::Complete, state.iteration).with_exit_reason(Some(reason));
                self.store.write_status(&status)?;
                report.exit_reason = Some(reason);
                options.emit(LoopEvent::exit(state.iteration, reason.code()));
                break;
            }

            let next_iteration = state.iteration + 1;
            options.emit(LoopEvent::start(next_iteration));

            let budget = self.acquire_budget(&limiter, state.iteration, options).await?;

            let request = AgentRequest {
                root: self.config.root.clone(),
                args: options.agent_args.clone(),
                prompt: build_loop_prompt(&self.config.step, &handoff_path, next_iteration),
                timeout: Some(config.invocation_timeout()),
            };
            let mut invocation = self.invoke(&request).await;
            state.advance_iteration();
            let call_count = limiter.record_call(&*self.store)?;
            report.last_session = invocation.run.take().map(|run| run.session);

            let files_modified = match invocation.status.files_modified {
                Some(count) => count,
                None => git_change_count(&self.config.root).await,
            };
            if let Some(error) = &invocation.error {
                invocation.status.absorb_invocation_error(error);
            }

            let mut phase = evaluate(
                &config,
                &invocation.status,
                invocation.status_found,
                files_modified,
                &mut state,
            );
            if phase == LoopPhase::Running && invocation.error.is_some() {
                phase = LoopPhase::Error;
            }

            let last_error = invocation
                .error
                .clone()
                .or_else(|| (!invocation.status_found).then(|| MISSING_STATUS_ERROR.to_string()));
            let snapshot = LoopStatus::new(phase.display_state(), state.iteration)
                .with_exit_reason(phase.exit_reason())
                .with_summary(&invocation.status.summary)
                .with_error(last_error.as_deref().unwrap_or_default())
                .with_budget(call_count, budget.next_reset_at);
            self.persist(&state, &snapshot)?;
            log::info!(
                "Iteration {} finished: state={} files_modified={}",
                state.iteration,
                snapshot.state,
                files_modified
            );

            if let Some(reason) = phase.exit_reason() {
                log::info!("Loop stopped: {}", reason);
                report.exit_reason = Some(reason);
                options.emit(LoopEvent::exit(state.iteration, reason.code()));
                break;
            }
            if let Some(err) = invocation.fatal {
                log::error!("Loop aborted at iteration {}: {}", state.iteration, err);
                options.emit(LoopEvent::error(state.iteration, err.to_string()));
                report.iterations = state.iteration;
                return Err(err);
            }
            options.emit(LoopEvent::done(state.iteration));
        }

        report.iterations = state.iteration;
        Ok(report)
    }

    /// Acquire call budget, sleeping in `waiting` state while it is exhausted.
    async fn acquire_budget(&self, limiter: &RateLimiter, iteration: u64, options: &LoopOptions) -> Result<Budget> {
        let mut budget = limiter.acquire(&*self.store)?;
        while !budget.is_available() {
            let status = LoopStatus::new(DisplayState::Waiting, iteration)
                .with_budget(budget.call_count, budget.next_reset_at);
            self.store.write_status(&status)?;
            let wait = humanize_duration(budget.wait);
            log::info!("Call budget exhausted, waiting {}", wait);
            options.emit(LoopEvent::waiting(iteration, wait));
            tokio::time::sleep(budget.wait).await;
            budget = limiter.acquire(&*self.store)?;
        }
        Ok(budget)
    }

    async fn invoke(&self, request: &AgentRequest) -> Invocation {
        let run = match self.runner.run(request).await {
            Ok(run) => run,
            Err(err) => {
                return Invocation {
                    run: None,
                    status: LooprStatus::default(),
                    status_found: false,
                    error: Some(err.to_string()),
                    fatal: Some(err),
                };
            }
        };

        let mut error = run.error.clone();
        let (status, status_found) = match parse_status_file(&run.session.transcript_path) {
            Ok(Some(status)) => (status, true),
            Ok(None) => (LooprStatus::default(), false),
            Err(err) => {
                log::warn!("Failed to read transcript {}: {}", run.session.transcript_path.display(), err);
                if error.is_none() {
                    error = Some(format!("read transcript: {}", err));
                }
                (LooprStatus::default(), false)
            }
        };

        Invocation {
            run: Some(run),
            status,
            status_found,
            error,
            fatal: None,
        }
    }

    /// Durable writes, most authoritative first.
    fn persist(&self, state: &LoopState, snapshot: &LoopStatus) -> Result<()> {
        self.store.load_state()?.ensure_successor(state)?;
        self.store.save_state(state)?;
        self.store.append_log(&LoopLogEntry::from_status(snapshot))?;
        self.store.write_status(snapshot)
    }
}
