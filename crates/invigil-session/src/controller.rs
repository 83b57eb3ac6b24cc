//! The session controller actor: one isolated Tokio task per mounted
//! exam attempt.
//!
//! The task owns the attempt state and is the only writer to it. Four
//! independent event sources feed it, all serialized through one
//! `tokio::select!` loop:
//!
//! - user actions, via the [`SessionHandle`] command channel;
//! - the push subscription on the attempt's session channel;
//! - the 1 Hz tick scheduler (countdown and grace decrements);
//! - the coarse polling scheduler (fetch-based sync fallback).
//!
//! Serial delivery eliminates data races; the version guard inside the
//! machine eliminates the remaining *ordering* races (a stale poll
//! response landing after a newer push). Unmounting — an explicit
//! `shutdown`, dropping every handle, or termination — ends the task,
//! which tears down both schedulers and the subscription with it.

use std::sync::Arc;
use std::time::Duration;

use invigil_protocol::{
    AnswerSlot, AnswerValue, ExamId, ExamMeta, ExamSession, Question,
    QuestionId, SessionStatus, StudentId, SyncEvent, session_channel,
};
use invigil_sync::{Subscription, SyncChannel, SyncSource};
use invigil_tick::{TickConfig, TickScheduler};
use tokio::sync::{mpsc, oneshot};

use crate::machine::{Phase, SessionMachine, SyncOutcome, TickOutcome, TimerState};
use crate::{SaveAnswer, SessionError, SessionGateway};

/// Command channel depth. Backpressure on user actions is fine — a
/// human can't outrun a 64-slot queue.
const COMMAND_CHANNEL_SIZE: usize = 64;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunables for one controller instance.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Grace window after local countdown expiry, in seconds.
    pub grace_window_seconds: u64,
    /// Polling fallback cadence. Coarse on purpose — polling is a
    /// safety net, not the primary sync path.
    pub poll_interval: Duration,
    /// First-tick jitter passed to the schedulers. Zero for
    /// deterministic tests.
    pub tick_jitter_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            grace_window_seconds: crate::machine::DEFAULT_GRACE_SECONDS,
            poll_interval: Duration::from_secs(60),
            tick_jitter_ms: 250,
        }
    }
}

// ---------------------------------------------------------------------------
// Events out, commands in
// ---------------------------------------------------------------------------

/// Why an attempt stopped accepting input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// The student finished voluntarily.
    Manual,
    /// The grace window expired with no rescue sync.
    AutoTimeout,
    /// An administrator force-finished the attempt.
    ForceFinished,
}

/// What the controller tells its UI layer.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Mount complete; the attempt is running.
    Loaded { question_count: usize, remaining_seconds: u64 },
    /// Local countdown decrement.
    CountdownTick { seconds: u64 },
    /// Countdown exhausted; grace window opened.
    GraceStarted { seconds: u64 },
    /// Grace window decrement.
    GraceTick { seconds: u64 },
    /// An authoritative sync was applied.
    Synchronized {
        remaining_seconds: u64,
        source: SyncSource,
        grace_cancelled: bool,
    },
    /// The version guard dropped a stale sync.
    StaleSyncDropped { version: u64 },
    /// The finish decision is made; the gateway call is in flight.
    Submitting { reason: FinishReason },
    /// The attempt is over client-side. `submitted` reports whether the
    /// finish call reached the server (force-finish never calls it).
    Terminated { reason: FinishReason, submitted: bool },
}

/// Bounded navigation moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nav {
    Next,
    Prev,
    Jump(usize),
}

enum Command {
    Answer {
        question: QuestionId,
        value: AnswerValue,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Flag {
        question: QuestionId,
        flagged: bool,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Navigate {
        nav: Nav,
        reply: oneshot::Sender<usize>,
    },
    Finish {
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    View {
        reply: oneshot::Sender<SessionView>,
    },
    Shutdown,
}

// ---------------------------------------------------------------------------
// SessionView
// ---------------------------------------------------------------------------

/// A read-only snapshot for rendering. Cheap enough to rebuild on every
/// request; never cached by the controller.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub phase: Phase,
    pub timer: TimerState,
    pub status: SessionStatus,
    pub current_index: usize,
    pub question_count: usize,
    pub current_question: Option<Question>,
    /// The cached slot for the current question (default if untouched).
    pub current_slot: AnswerSlot,
    pub answered_count: usize,
    /// Whether every question satisfies its kind's completeness rule.
    /// Gates the submit affordance only — finishing with an incomplete
    /// attempt is always allowed.
    pub all_answered: bool,
    pub extra_time_seconds: u64,
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// Handle to a running session controller. Cheap to clone.
///
/// Every method returns [`SessionError::Unavailable`] once the
/// controller task has exited (terminated attempt or unmounted view).
#[derive(Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<Command>,
}

impl SessionHandle {
    /// Records an answer for a question and schedules a best-effort
    /// save. The local cache is updated before this returns.
    pub async fn answer(
        &self,
        question: QuestionId,
        value: AnswerValue,
    ) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(Command::Answer { question, value, reply })
            .await
            .map_err(|_| SessionError::Unavailable)?;
        rx.await.map_err(|_| SessionError::Unavailable)?
    }

    /// Sets or clears the review flag on a question.
    pub async fn set_flag(
        &self,
        question: QuestionId,
        flagged: bool,
    ) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(Command::Flag { question, flagged, reply })
            .await
            .map_err(|_| SessionError::Unavailable)?;
        rx.await.map_err(|_| SessionError::Unavailable)?
    }

    /// Moves to the next question. Returns the new index.
    pub async fn next(&self) -> Result<usize, SessionError> {
        self.navigate(Nav::Next).await
    }

    /// Moves to the previous question. Returns the new index.
    pub async fn prev(&self) -> Result<usize, SessionError> {
        self.navigate(Nav::Prev).await
    }

    /// Jumps to a question by index (clamped to bounds). Returns the
    /// new index.
    pub async fn jump(&self, index: usize) -> Result<usize, SessionError> {
        self.navigate(Nav::Jump(index)).await
    }

    async fn navigate(&self, nav: Nav) -> Result<usize, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(Command::Navigate { nav, reply })
            .await
            .map_err(|_| SessionError::Unavailable)?;
        rx.await.map_err(|_| SessionError::Unavailable)
    }

    /// Finishes the attempt voluntarily.
    pub async fn finish(&self) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(Command::Finish { reply })
            .await
            .map_err(|_| SessionError::Unavailable)?;
        rx.await.map_err(|_| SessionError::Unavailable)?
    }

    /// Takes a rendering snapshot.
    pub async fn view(&self) -> Result<SessionView, SessionError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(Command::View { reply })
            .await
            .map_err(|_| SessionError::Unavailable)?;
        rx.await.map_err(|_| SessionError::Unavailable)
    }

    /// Unmounts the controller: cancels all timers and the push
    /// subscription without submitting anything.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.sender
            .send(Command::Shutdown)
            .await
            .map_err(|_| SessionError::Unavailable)
    }
}

// ---------------------------------------------------------------------------
// Spawn
// ---------------------------------------------------------------------------

/// Mounts one attempt and spawns its controller task.
///
/// Subscribes to the session channel first (so no push event can slip
/// between the fetch and the subscription), then performs the initial
/// fetch. Both failures are fatal: no partial exam UI, no task spawned.
///
/// # Errors
/// - [`SessionError::Subscribe`] — the push channel rejected the
///   subscription.
/// - [`SessionError::FatalLoad`] — the initial session fetch failed.
pub async fn spawn_session<G, C>(
    exam_id: ExamId,
    student_id: StudentId,
    gateway: Arc<G>,
    sync: C,
    config: SessionConfig,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> Result<SessionHandle, SessionError>
where
    G: SessionGateway,
    C: SyncChannel,
{
    let channel = session_channel(exam_id, student_id);
    let subscription = sync.subscribe(&channel).await.map_err(|e| {
        tracing::error!(%exam_id, %student_id, error = %e, "subscribe failed");
        SessionError::Subscribe(e.to_string())
    })?;

    let load = gateway.fetch_session(exam_id).await.map_err(|e| {
        tracing::error!(%exam_id, %student_id, error = %e, "session load failed");
        SessionError::FatalLoad(e)
    })?;

    let timer_type = load.session.timer_type;
    let mut machine = SessionMachine::with_grace_window(
        timer_type,
        load.session.remaining_seconds,
        config.grace_window_seconds,
    );
    // Stamp the load's channel version so the guard has a baseline to
    // compare the first push against.
    if load.sync_version > 0 {
        machine.on_sync(
            load.session.remaining_seconds,
            load.sync_version,
            SyncSource::Poll,
        );
    }

    let state = ControllerState {
        exam: load.exam,
        questions: load.questions,
        session: load.session,
        machine,
        current_index: 0,
    };

    tracing::info!(
        %exam_id,
        %student_id,
        exam = %state.exam.title,
        questions = state.questions.len(),
        remaining = state.session.remaining_seconds,
        timer = ?timer_type,
        "session mounted"
    );
    let _ = events.send(SessionEvent::Loaded {
        question_count: state.questions.len(),
        remaining_seconds: state.session.remaining_seconds,
    });

    let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
    tokio::spawn(run_controller(
        exam_id,
        student_id,
        gateway,
        config,
        state,
        subscription,
        events,
        rx,
    ));
    Ok(SessionHandle { sender: tx })
}

// ---------------------------------------------------------------------------
// Actor internals
// ---------------------------------------------------------------------------

struct ControllerState {
    exam: ExamMeta,
    questions: Vec<Question>,
    session: ExamSession,
    machine: SessionMachine,
    current_index: usize,
}

impl ControllerState {
    fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    fn all_answered(&self) -> bool {
        self.questions
            .iter()
            .all(|q| q.is_answered_by(self.session.answers.get(&q.id)))
    }

    fn apply_nav(&mut self, nav: Nav) -> usize {
        let last = self.questions.len().saturating_sub(1);
        self.current_index = match nav {
            Nav::Next => (self.current_index + 1).min(last),
            Nav::Prev => self.current_index.saturating_sub(1),
            Nav::Jump(index) => index.min(last),
        };
        self.current_index
    }

    fn view(&self) -> SessionView {
        let current_question = self.questions.get(self.current_index).cloned();
        let current_slot = current_question
            .as_ref()
            .and_then(|q| self.session.answers.get(&q.id))
            .cloned()
            .unwrap_or_default();
        SessionView {
            phase: self.machine.phase(),
            timer: self.machine.timer_state(),
            status: self.session.status,
            current_index: self.current_index,
            question_count: self.questions.len(),
            current_question,
            current_slot,
            answered_count: self.session.answered_count(),
            all_answered: self.all_answered(),
            extra_time_seconds: self.session.extra_time_seconds,
        }
    }
}

#[derive(PartialEq)]
enum Flow {
    Continue,
    Stop,
}

#[allow(clippy::too_many_arguments)]
async fn run_controller<G>(
    exam_id: ExamId,
    student_id: StudentId,
    gateway: Arc<G>,
    config: SessionConfig,
    mut state: ControllerState,
    mut subscription: Subscription,
    events: mpsc::UnboundedSender<SessionEvent>,
    mut commands: mpsc::Receiver<Command>,
) where
    G: SessionGateway,
{
    // One 1 Hz driver covers both the countdown and the grace window
    // (the machine knows which one a tick applies to); flexible-timer
    // attempts get a manual scheduler that never fires. The poller is
    // the independent coarse fallback.
    let mut ticker = TickScheduler::new(if state.session.timer_type.has_countdown() {
        TickConfig {
            initial_jitter_ms: config.tick_jitter_ms,
            ..TickConfig::seconds()
        }
    } else {
        TickConfig::manual()
    });
    let mut poller = TickScheduler::new(TickConfig {
        initial_jitter_ms: config.tick_jitter_ms,
        ..TickConfig::every(config.poll_interval)
    });

    // Finish calls run detached; their outcome re-enters the loop here.
    let (finish_tx, mut finish_done) = mpsc::unbounded_channel::<bool>();
    let mut pending_finish: Option<FinishReason> = None;

    let mut push_open = true;

    loop {
        tokio::select! {
            // Reconciliation priority when several sources are ready in
            // the same iteration: push > tick (grace expiry / local
            // decrement) > poll > user actions.
            biased;

            maybe_frame = subscription.next(), if push_open => {
                match maybe_frame {
                    Some(frame) => {
                        if handle_frame(&mut state, frame.version, frame.event, &events)
                            == Flow::Stop
                        {
                            break;
                        }
                    }
                    None => {
                        // Push is gone; the poll fallback keeps the
                        // attempt honest until it recovers.
                        tracing::warn!(%exam_id, %student_id, "push channel closed");
                        push_open = false;
                    }
                }
            }

            _ = ticker.wait_for_tick() => {
                match state.machine.on_tick() {
                    TickOutcome::Countdown(seconds) => {
                        state.session.remaining_seconds = seconds;
                        let _ = events.send(SessionEvent::CountdownTick { seconds });
                    }
                    TickOutcome::GraceStarted(seconds) => {
                        state.session.remaining_seconds = 0;
                        let _ = events.send(SessionEvent::GraceStarted { seconds });
                    }
                    TickOutcome::Grace(seconds) => {
                        let _ = events.send(SessionEvent::GraceTick { seconds });
                    }
                    TickOutcome::AutoSubmit => {
                        start_finish(
                            &gateway,
                            exam_id,
                            FinishReason::AutoTimeout,
                            &mut pending_finish,
                            &finish_tx,
                            &events,
                        );
                    }
                    TickOutcome::Idle => {}
                }
            }

            _ = poller.wait_for_tick() => {
                // Awaited inline: the poll response enters the loop
                // serially like every other event, and the version
                // guard handles any staleness.
                match gateway.fetch_session(exam_id).await {
                    Ok(load) => {
                        state.session.extra_time_seconds =
                            load.session.extra_time_seconds;
                        state.session.status = load.session.status;
                        apply_sync(
                            &mut state,
                            load.session.remaining_seconds,
                            load.sync_version,
                            SyncSource::Poll,
                            &events,
                        );
                    }
                    Err(e) => {
                        tracing::debug!(%exam_id, error = %e, "poll fetch failed");
                    }
                }
            }

            maybe_ok = finish_done.recv(), if pending_finish.is_some() => {
                let submitted = maybe_ok.unwrap_or(false);
                let reason = pending_finish.take().expect("pending finish reason");
                state.machine.on_submit_resolved();
                state.session.status = match reason {
                    FinishReason::AutoTimeout => SessionStatus::TimedOut,
                    _ => SessionStatus::Finished,
                };
                if !submitted {
                    tracing::warn!(
                        %exam_id, %student_id,
                        "finish call failed; exiting the attempt anyway"
                    );
                }
                let _ = events.send(SessionEvent::Terminated { reason, submitted });
                break;
            }

            maybe_cmd = commands.recv() => {
                match maybe_cmd {
                    Some(cmd) => {
                        let flow = handle_command(
                            &mut state,
                            &gateway,
                            exam_id,
                            cmd,
                            &mut pending_finish,
                            &finish_tx,
                            &events,
                        );
                        if flow == Flow::Stop {
                            break;
                        }
                    }
                    // Every handle dropped: the view unmounted.
                    None => {
                        tracing::debug!(%exam_id, %student_id, "all handles dropped; unmounting");
                        break;
                    }
                }
            }
        }
    }

    tracing::info!(%exam_id, %student_id, "session controller stopped");
    // Schedulers and the subscription drop here: timers cancelled,
    // channel unsubscribed.
}

fn handle_command<G: SessionGateway>(
    state: &mut ControllerState,
    gateway: &Arc<G>,
    exam_id: ExamId,
    cmd: Command,
    pending_finish: &mut Option<FinishReason>,
    finish_tx: &mpsc::UnboundedSender<bool>,
    events: &mpsc::UnboundedSender<SessionEvent>,
) -> Flow {
    match cmd {
        Command::Answer { question, value, reply } => {
            let _ = reply.send(record_answer(
                state,
                gateway,
                exam_id,
                question,
                Some(value),
                None,
            ));
        }
        Command::Flag { question, flagged, reply } => {
            let _ = reply.send(record_answer(
                state,
                gateway,
                exam_id,
                question,
                None,
                Some(flagged),
            ));
        }
        Command::Navigate { nav, reply } => {
            let _ = reply.send(state.apply_nav(nav));
        }
        Command::Finish { reply } => {
            if state.machine.on_manual_finish() {
                start_finish(
                    gateway,
                    exam_id,
                    FinishReason::Manual,
                    pending_finish,
                    finish_tx,
                    events,
                );
                let _ = reply.send(Ok(()));
            } else {
                let _ = reply.send(Err(SessionError::Unavailable));
            }
        }
        Command::View { reply } => {
            let _ = reply.send(state.view());
        }
        Command::Shutdown => return Flow::Stop,
    }
    Flow::Continue
}

/// Updates the local answer cache and schedules the fire-and-forget
/// save. The cache write is unconditional and immediate; the network
/// call is detached and its failure only logged.
fn record_answer<G: SessionGateway>(
    state: &mut ControllerState,
    gateway: &Arc<G>,
    exam_id: ExamId,
    question: QuestionId,
    value: Option<AnswerValue>,
    flagged: Option<bool>,
) -> Result<(), SessionError> {
    if state.machine.phase().is_terminal() {
        return Err(SessionError::Unavailable);
    }
    if state.question(question).is_none() {
        return Err(SessionError::UnknownQuestion(question));
    }

    let slot = state.session.answers.entry(question).or_default();
    if let Some(value) = value {
        slot.value = Some(value);
    }
    if let Some(flagged) = flagged {
        slot.flagged = flagged;
    }
    let save = SaveAnswer {
        question_id: question,
        answer: slot.value.clone(),
        flagged: slot.flagged,
    };

    let gateway = Arc::clone(gateway);
    tokio::spawn(async move {
        if let Err(e) = gateway.save_answer(exam_id, save).await {
            // Best effort by contract: no retry, nothing surfaced.
            tracing::warn!(%exam_id, %question, error = %e, "answer save failed");
        }
    });
    Ok(())
}

fn handle_frame(
    state: &mut ControllerState,
    version: u64,
    event: SyncEvent,
    events: &mpsc::UnboundedSender<SessionEvent>,
) -> Flow {
    match event {
        SyncEvent::TimerSynchronized { remaining_seconds } => {
            apply_sync(state, remaining_seconds, version, SyncSource::Push, events);
            Flow::Continue
        }
        SyncEvent::ExamForceFinished => {
            // Absorbing: preempts everything, including an in-flight
            // finish call (the detached task just completes unheard).
            if state.machine.on_force_finish() {
                state.session.status = SessionStatus::Finished;
                let _ = events.send(SessionEvent::Terminated {
                    reason: FinishReason::ForceFinished,
                    submitted: false,
                });
            }
            Flow::Stop
        }
        SyncEvent::LiveScoreUpdated { .. } => {
            // Roster traffic belongs to the exam channel; nothing to do
            // on a session channel.
            tracing::debug!("ignoring roster event on session channel");
            Flow::Continue
        }
    }
}

fn apply_sync(
    state: &mut ControllerState,
    remaining_seconds: u64,
    version: u64,
    source: SyncSource,
    events: &mpsc::UnboundedSender<SessionEvent>,
) {
    match state.machine.on_sync(remaining_seconds, version, source) {
        SyncOutcome::Applied { countdown, grace_cancelled } => {
            state.session.remaining_seconds = countdown;
            let _ = events.send(SessionEvent::Synchronized {
                remaining_seconds: countdown,
                source,
                grace_cancelled,
            });
        }
        SyncOutcome::Stale => {
            let _ = events.send(SessionEvent::StaleSyncDropped { version });
        }
    }
}

/// Kicks off the finish gateway call as a detached task and records it
/// as pending. The select! loop stays responsive (navigation and answer
/// edits keep working) until the call resolves.
fn start_finish<G: SessionGateway>(
    gateway: &Arc<G>,
    exam_id: ExamId,
    reason: FinishReason,
    pending_finish: &mut Option<FinishReason>,
    finish_tx: &mpsc::UnboundedSender<bool>,
    events: &mpsc::UnboundedSender<SessionEvent>,
) {
    let _ = events.send(SessionEvent::Submitting { reason });
    *pending_finish = Some(reason);

    let gateway = Arc::clone(gateway);
    let finish_tx = finish_tx.clone();
    tokio::spawn(async move {
        let ok = match gateway.finish_session(exam_id).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%exam_id, error = %e, "finish session call failed");
                false
            }
        };
        let _ = finish_tx.send(ok);
    });
}
