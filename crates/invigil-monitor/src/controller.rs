//! The monitor actor: one isolated Tokio task per observed exam.
//!
//! Owns the roster and is its only writer. Three event sources, all
//! serialized through one `tokio::select!` loop:
//!
//! - administrator commands, via the [`MonitorHandle`];
//! - the push subscription on the exam channel (`LiveScoreUpdated`);
//! - the 1 Hz tick scheduler (smooth countdown between reports).
//!
//! Administrative overrides follow guard → gateway → unconditional
//! refetch: eligibility is checked against the roster before the
//! network call, and a successful call is followed by a full snapshot
//! fetch rather than a local patch.

use std::sync::Arc;

use invigil_protocol::{ExamId, StudentId, SyncEvent, exam_channel};
use invigil_sync::{Subscription, SyncChannel};
use invigil_tick::{TickConfig, TickScheduler};
use tokio::sync::{mpsc, oneshot};

use crate::roster::{RankSnapshot, Roster};
use crate::{MonitorError, MonitorGateway};

/// Command channel depth — admin actions are human-paced.
const COMMAND_CHANNEL_SIZE: usize = 64;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tunables for one monitor instance.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// First-tick jitter for the 1 Hz scheduler. Zero for deterministic
    /// tests.
    pub tick_jitter_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self { tick_jitter_ms: 250 }
    }
}

// ---------------------------------------------------------------------------
// Events out, commands in
// ---------------------------------------------------------------------------

/// What the aggregator tells its UI layer.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// Mount complete; the roster is live.
    Loaded { sessions: usize },
    /// A new leaderboard frame (after a merge, tick, or refetch).
    RosterUpdated(RankSnapshot),
}

enum Command {
    ForceFinish {
        student: StudentId,
        reply: oneshot::Sender<Result<(), MonitorError>>,
    },
    AddTime {
        student: StudentId,
        minutes: u32,
        reply: oneshot::Sender<Result<(), MonitorError>>,
    },
    Reopen {
        student: StudentId,
        extra_minutes: u32,
        reply: oneshot::Sender<Result<(), MonitorError>>,
    },
    Refresh {
        reply: oneshot::Sender<Result<(), MonitorError>>,
    },
    Snapshot {
        reply: oneshot::Sender<RankSnapshot>,
    },
    Shutdown,
}

// ---------------------------------------------------------------------------
// MonitorHandle
// ---------------------------------------------------------------------------

/// Handle to a running monitor. Cheap to clone.
///
/// The destructive commands (`force_finish`, `reopen`) expect the UI to
/// have confirmed with the administrator first — the handle itself does
/// not ask twice.
#[derive(Clone)]
pub struct MonitorHandle {
    sender: mpsc::Sender<Command>,
}

impl MonitorHandle {
    /// Force-finishes a student's session. Only valid while their
    /// status is in-progress, completed, or timed-out.
    pub async fn force_finish(
        &self,
        student: StudentId,
    ) -> Result<(), MonitorError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(Command::ForceFinish { student, reply })
            .await
            .map_err(|_| MonitorError::Unavailable)?;
        rx.await.map_err(|_| MonitorError::Unavailable)?
    }

    /// Grants `minutes` (≥ 1) of extra time. Valid in any non-finished
    /// status.
    pub async fn add_time(
        &self,
        student: StudentId,
        minutes: u32,
    ) -> Result<(), MonitorError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(Command::AddTime { student, minutes, reply })
            .await
            .map_err(|_| MonitorError::Unavailable)?;
        rx.await.map_err(|_| MonitorError::Unavailable)?
    }

    /// Reopens a finished session, optionally granting extra minutes.
    pub async fn reopen(
        &self,
        student: StudentId,
        extra_minutes: u32,
    ) -> Result<(), MonitorError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(Command::Reopen { student, extra_minutes, reply })
            .await
            .map_err(|_| MonitorError::Unavailable)?;
        rx.await.map_err(|_| MonitorError::Unavailable)?
    }

    /// Forces a full roster refetch.
    pub async fn refresh(&self) -> Result<(), MonitorError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(Command::Refresh { reply })
            .await
            .map_err(|_| MonitorError::Unavailable)?;
        rx.await.map_err(|_| MonitorError::Unavailable)?
    }

    /// Takes the current leaderboard frame.
    pub async fn snapshot(&self) -> Result<RankSnapshot, MonitorError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| MonitorError::Unavailable)?;
        rx.await.map_err(|_| MonitorError::Unavailable)
    }

    /// Unmounts the monitor: cancels the tick loop and unsubscribes.
    pub async fn shutdown(&self) -> Result<(), MonitorError> {
        self.sender
            .send(Command::Shutdown)
            .await
            .map_err(|_| MonitorError::Unavailable)
    }
}

// ---------------------------------------------------------------------------
// Spawn
// ---------------------------------------------------------------------------

/// Mounts the roster for one exam and spawns its monitor task.
///
/// # Errors
/// - [`MonitorError::Subscribe`] — the push channel rejected the
///   subscription.
/// - [`MonitorError::FatalLoad`] — the initial roster fetch failed.
pub async fn spawn_monitor<G, C>(
    exam_id: ExamId,
    gateway: Arc<G>,
    sync: C,
    config: MonitorConfig,
    events: mpsc::UnboundedSender<MonitorEvent>,
) -> Result<MonitorHandle, MonitorError>
where
    G: MonitorGateway,
    C: SyncChannel,
{
    let channel = exam_channel(exam_id);
    let subscription = sync.subscribe(&channel).await.map_err(|e| {
        tracing::error!(%exam_id, error = %e, "monitor subscribe failed");
        MonitorError::Subscribe(e.to_string())
    })?;

    let load = gateway.fetch_roster(exam_id).await.map_err(|e| {
        tracing::error!(%exam_id, error = %e, "roster load failed");
        MonitorError::FatalLoad(e)
    })?;

    tracing::info!(
        %exam_id,
        exam = %load.exam.title,
        sessions = load.sessions.len(),
        "monitor mounted"
    );
    let _ = events.send(MonitorEvent::Loaded {
        sessions: load.sessions.len(),
    });

    let mut roster = Roster::new();
    roster.load(load.sessions);
    let _ = events.send(MonitorEvent::RosterUpdated(roster.ranked()));

    let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
    tokio::spawn(run_monitor(
        exam_id,
        gateway,
        config,
        roster,
        subscription,
        events,
        rx,
    ));
    Ok(MonitorHandle { sender: tx })
}

// ---------------------------------------------------------------------------
// Actor internals
// ---------------------------------------------------------------------------

async fn run_monitor<G>(
    exam_id: ExamId,
    gateway: Arc<G>,
    config: MonitorConfig,
    mut roster: Roster,
    mut subscription: Subscription,
    events: mpsc::UnboundedSender<MonitorEvent>,
    mut commands: mpsc::Receiver<Command>,
) where
    G: MonitorGateway,
{
    let mut ticker = TickScheduler::new(TickConfig {
        initial_jitter_ms: config.tick_jitter_ms,
        ..TickConfig::seconds()
    });

    let mut push_open = true;

    loop {
        tokio::select! {
            biased;

            maybe_frame = subscription.next(), if push_open => {
                match maybe_frame {
                    Some(frame) => {
                        if let SyncEvent::LiveScoreUpdated { summary } = frame.event {
                            roster.upsert(summary);
                            let _ = events
                                .send(MonitorEvent::RosterUpdated(roster.ranked()));
                        }
                        // Timer and force-finish events on the exam
                        // channel are for students; the roster learns of
                        // their effects through LiveScoreUpdated.
                    }
                    None => {
                        tracing::warn!(%exam_id, "monitor push channel closed");
                        push_open = false;
                    }
                }
            }

            _ = ticker.wait_for_tick() => {
                if roster.tick_second() {
                    let _ = events.send(MonitorEvent::RosterUpdated(roster.ranked()));
                }
            }

            maybe_cmd = commands.recv() => {
                match maybe_cmd {
                    Some(Command::Shutdown) | None => {
                        tracing::debug!(%exam_id, "monitor unmounting");
                        break;
                    }
                    Some(cmd) => {
                        handle_command(&mut roster, &gateway, exam_id, cmd, &events)
                            .await;
                    }
                }
            }
        }
    }

    tracing::info!(%exam_id, "monitor stopped");
}

async fn handle_command<G: MonitorGateway>(
    roster: &mut Roster,
    gateway: &Arc<G>,
    exam_id: ExamId,
    cmd: Command,
    events: &mpsc::UnboundedSender<MonitorEvent>,
) {
    match cmd {
        Command::ForceFinish { student, reply } => {
            let result = force_finish(roster, gateway, exam_id, student).await;
            if result.is_ok() {
                refetch(roster, gateway, exam_id, events).await;
            }
            let _ = reply.send(result);
        }
        Command::AddTime { student, minutes, reply } => {
            let result = add_time(roster, gateway, exam_id, student, minutes).await;
            if result.is_ok() {
                refetch(roster, gateway, exam_id, events).await;
            }
            let _ = reply.send(result);
        }
        Command::Reopen { student, extra_minutes, reply } => {
            let result =
                reopen(roster, gateway, exam_id, student, extra_minutes).await;
            if result.is_ok() {
                refetch(roster, gateway, exam_id, events).await;
            }
            let _ = reply.send(result);
        }
        Command::Refresh { reply } => {
            let result = match gateway.fetch_roster(exam_id).await {
                Ok(load) => {
                    roster.load(load.sessions);
                    let _ =
                        events.send(MonitorEvent::RosterUpdated(roster.ranked()));
                    Ok(())
                }
                Err(e) => Err(MonitorError::Gateway(e)),
            };
            let _ = reply.send(result);
        }
        Command::Snapshot { reply } => {
            let _ = reply.send(roster.ranked());
        }
        Command::Shutdown => unreachable!("handled in the select loop"),
    }
}

/// Eligibility guard shared by the override commands: the student must
/// be on the roster, and their status must admit the command.
fn check_eligibility(
    roster: &Roster,
    student: StudentId,
    command: &'static str,
    allowed: impl Fn(invigil_protocol::SessionStatus) -> bool,
) -> Result<(), MonitorError> {
    let entry = roster
        .get(student)
        .ok_or(MonitorError::UnknownStudent(student))?;
    if !allowed(entry.status) {
        return Err(MonitorError::Ineligible {
            student,
            status: entry.status,
            command,
        });
    }
    Ok(())
}

async fn force_finish<G: MonitorGateway>(
    roster: &Roster,
    gateway: &Arc<G>,
    exam_id: ExamId,
    student: StudentId,
) -> Result<(), MonitorError> {
    check_eligibility(roster, student, "force-finish", |s| s.can_force_finish())?;
    tracing::info!(%exam_id, %student, "force-finishing session");
    gateway.force_finish(exam_id, student).await?;
    Ok(())
}

async fn add_time<G: MonitorGateway>(
    roster: &Roster,
    gateway: &Arc<G>,
    exam_id: ExamId,
    student: StudentId,
    minutes: u32,
) -> Result<(), MonitorError> {
    if minutes == 0 {
        return Err(MonitorError::InvalidMinutes(minutes));
    }
    check_eligibility(roster, student, "add-time", |s| s.can_add_time())?;
    tracing::info!(%exam_id, %student, minutes, "granting extra time");
    gateway.add_time(exam_id, student, minutes).await?;
    Ok(())
}

async fn reopen<G: MonitorGateway>(
    roster: &Roster,
    gateway: &Arc<G>,
    exam_id: ExamId,
    student: StudentId,
    extra_minutes: u32,
) -> Result<(), MonitorError> {
    check_eligibility(roster, student, "reopen", |s| s.can_reopen())?;
    tracing::info!(%exam_id, %student, extra_minutes, "reopening session");
    gateway.reopen(exam_id, student, extra_minutes).await?;
    Ok(())
}

/// The unconditional post-command refetch. A failure here is logged but
/// does not fail the command — the command itself already succeeded,
/// and the next push or tick keeps the roster converging.
async fn refetch<G: MonitorGateway>(
    roster: &mut Roster,
    gateway: &Arc<G>,
    exam_id: ExamId,
    events: &mpsc::UnboundedSender<MonitorEvent>,
) {
    match gateway.fetch_roster(exam_id).await {
        Ok(load) => {
            roster.load(load.sessions);
            let _ = events.send(MonitorEvent::RosterUpdated(roster.ranked()));
        }
        Err(e) => {
            tracing::warn!(%exam_id, error = %e, "post-command refetch failed");
        }
    }
}
