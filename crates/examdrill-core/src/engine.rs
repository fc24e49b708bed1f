//! Session driver.
//!
//! Runs one `ExamSession` on a tokio task: a one-second interval feeds the
//! clock, user commands arrive over an mpsc channel, and transition and
//! feedback deadlines are polled in the same `select!`. When the session
//! finishes it is graded (or parked for external grading) exactly once.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{Instant, Sleep};
use uuid::Uuid;

use crate::error::SessionError;
use crate::external::AwaitingResult;
use crate::grading::{grade, GradeOutcome};
use crate::model::{Answer, AnswerRecord, ExamResult, PracticeMode, StudyTask, TimingRecord};
use crate::remediation::generate_remediation_tasks;
use crate::report::SessionReport;
use crate::session::{ExamSession, FinishSummary, NavOutcome, SessionEvent, SessionState};
use crate::statistics::{build_analysis, SessionStats};
use crate::traits::SessionHooks;

/// Configuration for the session driver.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Clock tick period.
    pub tick: Duration,
    /// Date remediation tasks are scheduled from. Defaults to the local date.
    pub today: Option<NaiveDate>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            today: None,
        }
    }
}

/// User input forwarded to a running session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum SessionCommand {
    Answer { answer: Answer },
    ToggleOption { option: String },
    ClearAnswer,
    Next,
    Previous,
    JumpTo { index: usize },
    MarkForReview,
    Submit,
}

/// Receives every session event, including notification cues.
pub trait SessionObserver: Send + Sync {
    fn on_event(&self, event: &SessionEvent);

    /// A command the session refused.
    fn on_rejected(&self, _command: &SessionCommand, _error: &SessionError) {}
}

/// Observer that ignores everything.
pub struct NoopObserver;

impl SessionObserver for NoopObserver {
    fn on_event(&self, _: &SessionEvent) {}
}

/// What a finished session left behind.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub mode: PracticeMode,
    pub summary: FinishSummary,
    pub answers: AnswerRecord,
    pub timings: TimingRecord,
    pub marked_for_review: BTreeSet<u32>,
}

/// How a driven session ended.
#[derive(Debug)]
pub enum SessionOutcome {
    /// Graded locally against the key.
    Graded {
        record: SessionRecord,
        outcome: GradeOutcome,
        result: ExamResult,
        tasks: Vec<StudyTask>,
    },
    /// No usable key. The result is withheld until external grading succeeds.
    AwaitingGrading {
        record: SessionRecord,
        pending: AwaitingResult,
    },
    /// The command channel closed before the session finished.
    Abandoned { session_id: Uuid },
}

impl SessionOutcome {
    pub fn record(&self) -> Option<&SessionRecord> {
        match self {
            SessionOutcome::Graded { record, .. } | SessionOutcome::AwaitingGrading { record, .. } => {
                Some(record)
            }
            SessionOutcome::Abandoned { .. } => None,
        }
    }

    /// Build the persisted report. `None` for abandoned sessions.
    pub fn to_report(&self) -> Option<SessionReport> {
        let record = self.record()?;
        let (result, stats, tasks) = match self {
            SessionOutcome::Graded {
                outcome,
                result,
                tasks,
                ..
            } => (
                Some(result.clone()),
                Some(SessionStats::compute(outcome, &record.timings)),
                tasks.clone(),
            ),
            SessionOutcome::AwaitingGrading { pending, .. } => {
                (pending.result().cloned(), None, Vec::new())
            }
            SessionOutcome::Abandoned { .. } => return None,
        };
        Some(SessionReport {
            session_id: record.session_id,
            mode: record.mode,
            summary: record.summary.clone(),
            result,
            stats,
            tasks,
            marked_for_review: record.marked_for_review.iter().copied().collect(),
            answers: record.answers.clone(),
            timings: record.timings.clone(),
        })
    }
}

/// Drives a session to completion.
pub struct SessionRunner {
    hooks: Arc<dyn SessionHooks>,
    observer: Arc<dyn SessionObserver>,
    config: EngineConfig,
}

impl SessionRunner {
    pub fn new(
        hooks: Arc<dyn SessionHooks>,
        observer: Arc<dyn SessionObserver>,
        config: EngineConfig,
    ) -> Self {
        Self {
            hooks,
            observer,
            config,
        }
    }

    /// Start `session` (if needed) and run it until it finishes or the
    /// command channel closes.
    pub async fn run(
        &self,
        mut session: ExamSession,
        mut commands: mpsc::Receiver<SessionCommand>,
    ) -> Result<SessionOutcome, SessionError> {
        if session.state() == SessionState::NotStarted {
            session.start(Instant::now())?;
        }
        self.flush(&mut session);

        let period = self.config.tick;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);

        while session.state() == SessionState::Active {
            let transition_at = session.transition_deadline();
            let feedback_at = session.feedback_deadline();

            tokio::select! {
                _ = ticker.tick() => session.tick(Instant::now()),
                command = commands.recv() => match command {
                    Some(command) => self.apply(&mut session, command),
                    None => {
                        tracing::info!(session_id = %session.id(), "command channel closed, tearing down");
                        return Ok(SessionOutcome::Abandoned { session_id: session.id() });
                    }
                },
                _ = sleep_until(transition_at), if transition_at.is_some() => {
                    session.complete_transition(Instant::now());
                }
                _ = sleep_until(feedback_at), if feedback_at.is_some() => {
                    session.auto_advance(Instant::now());
                }
            }

            self.flush(&mut session);
        }

        drop(ticker);
        Ok(self.conclude(session))
    }

    /// Grade a finished session and fire the completion hooks. Consumes the
    /// session so it is graded once.
    pub fn conclude(&self, session: ExamSession) -> SessionOutcome {
        let Some(summary) = session.summary().cloned() else {
            return SessionOutcome::Abandoned {
                session_id: session.id(),
            };
        };

        let record = SessionRecord {
            session_id: session.id(),
            mode: session.mode(),
            summary,
            answers: session.answers(),
            timings: session.timings(),
            marked_for_review: session.marked_for_review(),
        };
        let config = session.config();
        let key = config.answer_key.as_ref().filter(|k| !k.is_empty());

        let Some(key) = key else {
            tracing::info!(session_id = %record.session_id, "no answer key, awaiting external grading");
            self.fire_complete(&record.summary);
            let pending = AwaitingResult::new(
                record.mode,
                config.syllabus.clone(),
                session.questions().to_vec(),
                record.answers.clone(),
                record.timings.clone(),
                config.source.clone(),
            );
            return SessionOutcome::AwaitingGrading { record, pending };
        };

        let questions = session.questions();
        let outcome = grade(questions, &record.answers, key, record.mode);
        let analysis = build_analysis(questions, &outcome, &record.timings);
        let result = outcome.to_result(&config.syllabus, &record.timings, Some(analysis));
        tracing::info!(
            session_id = %record.session_id,
            score = %result.score,
            mistakes = result.mistakes.len(),
            "session graded"
        );

        self.fire_complete(&record.summary);
        self.hooks.on_log_result(&result);

        let today = self
            .config
            .today
            .unwrap_or_else(|| chrono::Local::now().date_naive());
        let tasks = generate_remediation_tasks(
            record.mode,
            Some(key),
            &outcome,
            config.source.as_ref(),
            today,
        );
        for task in &tasks {
            self.hooks.on_save_task(task);
        }

        SessionOutcome::Graded {
            record,
            outcome,
            result,
            tasks,
        }
    }

    fn apply(&self, session: &mut ExamSession, command: SessionCommand) {
        let now = Instant::now();
        let applied = match &command {
            SessionCommand::Answer { answer } => session.answer(answer.clone(), now).map(drop),
            SessionCommand::ToggleOption { option } => session.toggle_option(option, now).map(drop),
            SessionCommand::ClearAnswer => session.clear_answer(),
            SessionCommand::MarkForReview => session.mark_for_review().map(drop),
            SessionCommand::Submit => {
                session.submit(now);
                Ok(())
            }
            SessionCommand::Next => {
                log_nav(session.next(now));
                Ok(())
            }
            SessionCommand::Previous => {
                log_nav(session.previous(now));
                Ok(())
            }
            SessionCommand::JumpTo { index } => {
                log_nav(session.jump_to(*index, now));
                Ok(())
            }
        };

        if let Err(e) = applied {
            tracing::warn!(?command, "command rejected: {e}");
            self.observer.on_rejected(&command, &e);
        }
    }

    fn flush(&self, session: &mut ExamSession) {
        for event in session.drain_events() {
            self.observer.on_event(&event);
        }
    }

    fn fire_complete(&self, summary: &FinishSummary) {
        self.hooks
            .on_session_complete(summary.duration_secs, summary.solved_count, &summary.skipped);
    }
}

fn log_nav(outcome: NavOutcome) {
    match outcome {
        NavOutcome::Busy => tracing::debug!("navigation ignored, transition in flight"),
        NavOutcome::Ignored => tracing::debug!("navigation target out of range"),
        NavOutcome::Started { target } => tracing::debug!(target, "navigating"),
        NavOutcome::Finished => tracing::debug!("navigated past the last question"),
    }
}

/// A sleep for an optional deadline. Guarded by a precondition in `select!`,
/// so the fallback is never awaited.
fn sleep_until(deadline: Option<Instant>) -> Sleep {
    tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now))
}
