//! Tour runner
//!
//! Executes a tour's steps against a live [`Document`]. Each run is a tokio
//! task that rechecks the current step's trigger on a timer until it matches
//! or the per-step timeout elapses. Progress is published on a watch channel
//! that the [`RunHandle`] reads; cancellation is a second watch channel the
//! task checks on every tick.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use super::registry::TourRegistry;
use super::step::{Step, StepKind, Tour};
use crate::common::{Error, Result};
use crate::document::{Document, ElementRef};

/// Per-run settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunOptions {
    /// Throttle between consecutive steps
    pub step_delay_ms: u64,
    /// Maximum wait for a single trigger
    pub timeout_ms_per_step: u64,
    /// Delay between trigger rechecks
    pub poll_interval_ms: u64,
    /// Log every step at INFO instead of DEBUG
    pub debug: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            step_delay_ms: 0,
            timeout_ms_per_step: 10_000,
            poll_interval_ms: 50,
            debug: false,
        }
    }
}

impl RunOptions {
    fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms_per_step)
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Lifecycle of a run: `pending -> running -> {passed, failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Passed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Passed | RunStatus::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "pending"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Passed => write!(f, "passed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Why a run failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunError {
    #[error("Step {step_index} ('{content}') timed out after {timeout_ms}ms waiting for '{trigger}'")]
    StepTimeout {
        step_index: usize,
        content: String,
        trigger: String,
        timeout_ms: u64,
    },

    #[error("Run cancelled at step {step_index} ('{content}')")]
    Cancelled {
        step_index: usize,
        content: String,
        trigger: String,
    },

    #[error("Step {step_index} ('{content}') action failed: {reason}")]
    ActionFailed {
        step_index: usize,
        content: String,
        trigger: String,
        reason: String,
    },
}

/// Diagnostic payload common to every run failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailurePayload {
    pub step_index: usize,
    pub content: String,
    pub trigger: String,
}

impl RunError {
    fn timeout(index: usize, step: &Step, timeout_ms: u64) -> Self {
        Self::StepTimeout {
            step_index: index,
            content: step.content().to_string(),
            trigger: step.trigger().to_string(),
            timeout_ms,
        }
    }

    fn cancelled(index: usize, step: &Step) -> Self {
        Self::Cancelled {
            step_index: index,
            content: step.content().to_string(),
            trigger: step.trigger().to_string(),
        }
    }

    fn action_failed(index: usize, step: &Step, error: Error) -> Self {
        Self::ActionFailed {
            step_index: index,
            content: step.content().to_string(),
            trigger: step.trigger().to_string(),
            reason: error.to_string(),
        }
    }

    pub fn step_index(&self) -> usize {
        match self {
            RunError::StepTimeout { step_index, .. }
            | RunError::Cancelled { step_index, .. }
            | RunError::ActionFailed { step_index, .. } => *step_index,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RunError::Cancelled { .. })
    }

    /// `{ step_index, content, trigger }` of the failing step
    pub fn payload(&self) -> FailurePayload {
        let (step_index, content, trigger) = match self {
            RunError::StepTimeout {
                step_index,
                content,
                trigger,
                ..
            }
            | RunError::Cancelled {
                step_index,
                content,
                trigger,
            }
            | RunError::ActionFailed {
                step_index,
                content,
                trigger,
                ..
            } => (*step_index, content, trigger),
        };
        FailurePayload {
            step_index,
            content: content.clone(),
            trigger: trigger.clone(),
        }
    }
}

/// State of one execution of a tour
#[derive(Debug, Clone, Serialize)]
pub struct Run {
    pub tour: String,
    pub status: RunStatus,
    /// Step currently (or last) being evaluated
    pub step_index: usize,
    /// Steps whose trigger was satisfied
    pub steps_completed: usize,
    pub steps_total: usize,
    pub last_error: Option<RunError>,
}

impl Run {
    fn new(tour: &Tour) -> Self {
        Self {
            tour: tour.name().to_string(),
            status: RunStatus::Pending,
            step_index: 0,
            steps_completed: 0,
            steps_total: tour.len(),
            last_error: None,
        }
    }
}

/// Handle on a started run
#[derive(Debug)]
pub struct RunHandle {
    state: watch::Receiver<Run>,
    cancel: watch::Sender<bool>,
}

impl RunHandle {
    pub fn status(&self) -> RunStatus {
        self.state.borrow().status
    }

    /// Current state, without waiting
    pub fn snapshot(&self) -> Run {
        self.state.borrow().clone()
    }

    /// Request cancellation
    ///
    /// Takes effect at the run's next poll tick. No-op once the run is terminal.
    pub fn cancel(&self) {
        if self.status().is_terminal() {
            return;
        }
        debug!(tour = %self.state.borrow().tour, "cancellation requested");
        self.cancel.send_replace(true);
    }

    /// Wait for the run to reach `passed` or `failed`
    pub async fn wait(&self) -> Run {
        let mut state = self.state.clone();
        let terminal = state
            .wait_for(|run| run.status.is_terminal())
            .await
            .map(|run| run.clone());
        terminal.unwrap_or_else(|_| state.borrow().clone())
    }
}

/// Marks a tour as having an active run until dropped
struct ActiveSlot {
    active: Arc<Mutex<HashSet<String>>>,
    tour: String,
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.tour);
    }
}

/// Starts tours against one document
pub struct TourRunner {
    document: Arc<dyn Document>,
    defaults: RunOptions,
    active: Arc<Mutex<HashSet<String>>>,
}

impl TourRunner {
    pub fn new(document: Arc<dyn Document>) -> Self {
        Self::with_defaults(document, RunOptions::default())
    }

    /// Runner whose `start(.., None)` uses `defaults`
    pub fn with_defaults(document: Arc<dyn Document>, defaults: RunOptions) -> Self {
        Self {
            document,
            defaults,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn defaults(&self) -> &RunOptions {
        &self.defaults
    }

    /// Start `tour` on the current tokio runtime
    ///
    /// Fails with `AlreadyRunning` if this runner has a non-terminal run of
    /// the same tour.
    pub fn start(&self, tour: Arc<Tour>, options: Option<RunOptions>) -> Result<RunHandle> {
        let options = options.unwrap_or(self.defaults);

        {
            let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
            if !active.insert(tour.name().to_string()) {
                return Err(Error::AlreadyRunning(tour.name().to_string()));
            }
        }
        let slot = ActiveSlot {
            active: Arc::clone(&self.active),
            tour: tour.name().to_string(),
        };

        let (state_tx, state_rx) = watch::channel(Run::new(&tour));
        let (cancel_tx, cancel_rx) = watch::channel(false);

        tokio::spawn(drive(
            tour,
            Arc::clone(&self.document),
            options,
            state_tx,
            cancel_rx,
            slot,
        ));

        Ok(RunHandle {
            state: state_rx,
            cancel: cancel_tx,
        })
    }

    /// Look `name` up in `registry` and start it
    pub fn run(
        &self,
        registry: &TourRegistry,
        name: &str,
        options: Option<RunOptions>,
    ) -> Result<RunHandle> {
        let tour = registry.get(name)?;
        self.start(tour, options)
    }
}

async fn drive(
    tour: Arc<Tour>,
    document: Arc<dyn Document>,
    options: RunOptions,
    state: watch::Sender<Run>,
    cancel: watch::Receiver<bool>,
    slot: ActiveSlot,
) {
    state.send_modify(|run| run.status = RunStatus::Running);
    info!(tour = tour.name(), steps = tour.len(), "tour started");

    let outcome = execute(&tour, document.as_ref(), &options, &state, &cancel).await;

    match &outcome {
        Ok(()) => info!(tour = tour.name(), "tour passed"),
        Err(e) if e.is_cancelled() => info!(tour = tour.name(), "{}", e),
        Err(e) => warn!(tour = tour.name(), "tour failed: {}", e),
    }

    // Free the tour before anyone can observe the terminal state
    drop(slot);
    state.send_modify(move |run| match outcome {
        Ok(()) => run.status = RunStatus::Passed,
        Err(e) => {
            run.status = RunStatus::Failed;
            run.last_error = Some(e);
        }
    });
}

async fn execute(
    tour: &Tour,
    document: &dyn Document,
    options: &RunOptions,
    state: &watch::Sender<Run>,
    cancel: &watch::Receiver<bool>,
) -> std::result::Result<(), RunError> {
    for (index, step) in tour.steps().iter().enumerate() {
        if index > 0 && options.step_delay_ms > 0 {
            sleep(options.step_delay()).await;
        }
        state.send_modify(|run| run.step_index = index);

        if options.debug {
            info!(tour = tour.name(), step = index, trigger = %step.trigger(), "{}", step.content());
        } else {
            debug!(tour = tour.name(), step = index, trigger = %step.trigger(), "{}", step.content());
        }

        let element = wait_for_trigger(document, step, index, options, cancel).await?;

        match step.kind() {
            StepKind::Wait => {}
            StepKind::Act(action) => {
                debug!(step = index, %action, "dispatching");
                document
                    .dispatch(element, action)
                    .await
                    .map_err(|e| RunError::action_failed(index, step, e))?;
            }
            StepKind::Check => {
                state.send_modify(|run| run.steps_completed = index + 1);
                return Ok(());
            }
        }

        state.send_modify(|run| run.steps_completed = index + 1);
    }

    Ok(())
}

/// Poll `step`'s trigger until it matches, the timeout elapses, or the run is cancelled
async fn wait_for_trigger(
    document: &dyn Document,
    step: &Step,
    index: usize,
    options: &RunOptions,
    cancel: &watch::Receiver<bool>,
) -> std::result::Result<ElementRef, RunError> {
    let deadline = Instant::now() + options.timeout();
    let mut polls = 0u64;

    loop {
        if *cancel.borrow() {
            return Err(RunError::cancelled(index, step));
        }

        polls += 1;
        if let Some(element) = document.query(step.trigger()).await {
            debug!(step = index, polls, "trigger satisfied");
            return Ok(element);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(RunError::timeout(index, step, options.timeout_ms_per_step));
        }
        sleep(options.poll_interval().min(deadline - now)).await;
    }
}
