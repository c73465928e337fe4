//! The control loop deciding between accepting, draining and exiting.

use crate::{LifecycleResult, RuntimeContext};
use echopost_delivery::ReplayEngine;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Which phase the controller is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No health check has run yet.
    Starting,
    /// Remote unhealthy; the accepting flag is held.
    Accepting,
    /// Remote healthy and a backlog remains.
    Draining,
    /// Remote healthy and the queue is empty.
    Idle,
}

/// What the loop should do after one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Nothing left to do; leave the loop.
    Drained,
    /// Sleep this long, then iterate again. Zero means iterate at once.
    Wait(Duration),
}

/// Why [`Controller::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Remote healthy and nothing left to deliver.
    QueueDrained,
    Cancelled,
}

/// Single-task control loop over one [`RuntimeContext`].
pub struct Controller {
    ctx: RuntimeContext,
    engine: ReplayEngine,
    state: LifecycleState,
}

impl Controller {
    pub fn new(ctx: RuntimeContext) -> Self {
        let engine = ReplayEngine::new(
            ctx.queue().clone(),
            ctx.remote().clone(),
            ctx.logs().clone(),
        )
        .with_call_timeout(ctx.config().request_timeout);

        Self {
            ctx,
            engine,
            state: LifecycleState::Starting,
        }
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn context(&self) -> &RuntimeContext {
        &self.ctx
    }

    /// Give the context back for shutdown.
    pub fn into_context(self) -> RuntimeContext {
        self.ctx
    }

    /// Iterate until the queue drains against a healthy remote, or until
    /// `cancel` fires. Cancellation is observed between iterations and
    /// during sleeps, not in the middle of a network call.
    ///
    /// Returns an error only if the accepting flag cannot be taken or
    /// dropped, which means another controller shares the base directory.
    pub async fn run(&mut self, cancel: &CancellationToken) -> LifecycleResult<ExitReason> {
        info!("controller_started");

        loop {
            if cancel.is_cancelled() {
                info!("controller_cancelled");
                return Ok(ExitReason::Cancelled);
            }

            match self.step(cancel).await? {
                Step::Drained => return Ok(ExitReason::QueueDrained),
                Step::Wait(delay) if delay.is_zero() => {}
                Step::Wait(delay) => {
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            info!("controller_cancelled");
                            return Ok(ExitReason::Cancelled);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// One iteration: health check, transition, and either replay or flush.
    pub async fn step(&mut self, cancel: &CancellationToken) -> LifecycleResult<Step> {
        let healthy = self.ctx.remote().is_healthy().await;
        if healthy {
            self.step_healthy(cancel).await
        } else {
            self.step_unhealthy().await
        }
    }

    async fn step_healthy(&mut self, cancel: &CancellationToken) -> LifecycleResult<Step> {
        if self.ctx.flag.is_held() {
            self.ctx.flag.release()?;
            info!("main_healthy_not_accepting_logs");
        } else {
            debug!("main_healthy");
        }

        self.flush_queue().await;
        // Give writes that raced the flush a moment to land.
        tokio::time::sleep(self.ctx.config().settle_delay).await;

        match self.ctx.queue().is_empty().await {
            Ok(true) => {
                info!("queue_empty_exiting");
                self.state = LifecycleState::Idle;
                return Ok(Step::Drained);
            }
            Ok(false) => {}
            Err(e) => {
                error!(error = %e, "queue_empty_check_error");
                return Ok(Step::Wait(self.ctx.config().unhealthy_cadence));
            }
        }

        self.state = LifecycleState::Draining;
        match self.engine.run_pass(cancel).await {
            Ok(report) => {
                debug!(
                    scanned = report.scanned,
                    resolved = report.resolved(),
                    cancelled = report.cancelled,
                    "replay_pass_finished"
                );
                Ok(Step::Wait(self.ctx.config().healthy_cadence))
            }
            Err(e) => {
                warn!(error = %e, "queue_process_error");
                Ok(Step::Wait(Duration::ZERO))
            }
        }
    }

    async fn step_unhealthy(&mut self) -> LifecycleResult<Step> {
        if !self.ctx.flag.is_held() {
            self.ctx.flag.acquire()?;
            info!("main_unhealthy_accepting_logs");
        }
        self.state = LifecycleState::Accepting;

        self.flush_queue().await;
        Ok(Step::Wait(self.ctx.config().unhealthy_cadence))
    }

    async fn flush_queue(&self) {
        if let Err(e) = self.ctx.queue().flush().await {
            warn!(error = %e, "queue_flush_error");
        }
    }
}
