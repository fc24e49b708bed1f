//! The exam session state machine.
//!
//! `ExamSession` owns everything a running session mutates: the answer,
//! timing and review slots (one per question position), the countdown clock,
//! navigation transitions and practice feedback. Every transition takes the
//! current instant explicitly so the machine can be driven by an event loop
//! or stepped by hand in tests. Side effects are queued as `SessionEvent`s
//! and drained by whoever drives the session.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use crate::clock::{ClockRegime, SessionClock, Tick};
use crate::error::SessionError;
use crate::feedback::{self, Verdict};
use crate::model::{
    Answer, AnswerKey, AnswerRecord, HomeworkSource, Paper, PracticeMode, Question, QuestionKind,
    TimingRecord,
};
use crate::normalize::{normalize, normalize_options, normalize_scalar};
use crate::range::{resolve_questions, QuestionSource};

/// Default debounce window for question transitions.
pub const NAV_DEBOUNCE: Duration = Duration::from_millis(300);

/// Lifecycle of a session. `Finished` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NotStarted,
    Active,
    Finished,
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    TimeUp,
    Submitted,
    /// `next()` on the last question.
    LastQuestion,
}

/// Notification cues for sound or vibration. Delivery is up to the observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cue {
    Correct,
    Incorrect,
    Neutral,
    TimeWarning,
    TimeUp,
}

/// Engagement summary produced when a session finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishSummary {
    pub reason: FinishReason,
    pub duration_secs: u64,
    pub solved_count: usize,
    pub skipped: Vec<u32>,
}

/// Everything observable that happens to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Started {
        session_id: Uuid,
        question_count: usize,
        total_secs: u64,
    },
    Tick {
        remaining_secs: u64,
    },
    Navigated {
        from: usize,
        to: usize,
    },
    AnswerRecorded {
        number: u32,
        answer: Option<Answer>,
    },
    FeedbackShown {
        number: u32,
        verdict: Verdict,
    },
    MarkedForReview {
        number: u32,
        marked: bool,
    },
    /// Finish requested mid-transition; it lands when the transition does.
    FinishDeferred {
        reason: FinishReason,
    },
    Finished(FinishSummary),
    Cue {
        cue: Cue,
    },
}

/// What a navigation request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavOutcome {
    /// A transition to `target` is under way.
    Started { target: usize },
    /// The request finished (or scheduled the finish of) the session.
    Finished,
    /// Another transition is still in flight.
    Busy,
    /// Out of range, or the session is not active.
    Ignored,
}

/// Static settings for one session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub mode: PracticeMode,
    pub clock: ClockRegime,
    pub syllabus: String,
    pub nav_debounce: Duration,
    pub answer_key: Option<AnswerKey>,
    pub source: Option<HomeworkSource>,
}

impl SessionConfig {
    /// A full-length mock exam on the default fixed clock.
    pub fn mock(syllabus: impl Into<String>) -> Self {
        Self {
            mode: PracticeMode::Mock,
            clock: ClockRegime::default(),
            syllabus: syllabus.into(),
            nav_debounce: NAV_DEBOUNCE,
            answer_key: None,
            source: None,
        }
    }

    /// A custom practice session with a per-question time budget.
    pub fn custom(syllabus: impl Into<String>, per_question_secs: u64) -> Self {
        Self {
            mode: PracticeMode::Custom,
            clock: ClockRegime::PerQuestion { per_question_secs },
            syllabus: syllabus.into(),
            nav_debounce: NAV_DEBOUNCE,
            answer_key: None,
            source: None,
        }
    }

    /// Settings for a session over `paper`. The syllabus falls back to the
    /// paper name.
    pub fn for_paper(paper: &Paper) -> Self {
        let syllabus = if paper.syllabus.trim().is_empty() {
            paper.name.clone()
        } else {
            paper.syllabus.clone()
        };
        Self {
            mode: paper.mode,
            clock: ClockRegime::for_mode(paper.mode, paper.duration_secs, paper.per_question_secs),
            syllabus,
            nav_debounce: NAV_DEBOUNCE,
            answer_key: paper.answer_key.clone(),
            source: paper.source.clone(),
        }
    }

    pub fn with_clock(mut self, clock: ClockRegime) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_answer_key(mut self, key: AnswerKey) -> Self {
        self.answer_key = Some(key);
        self
    }

    pub fn with_source(mut self, source: HomeworkSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_nav_debounce(mut self, debounce: Duration) -> Self {
        self.nav_debounce = debounce;
        self
    }
}

#[derive(Debug, Clone, Default)]
struct Slot {
    answer: Option<Answer>,
    time_spent: Duration,
    visited: bool,
    marked: bool,
}

#[derive(Debug, Clone)]
struct Transition {
    target: usize,
    completes_at: Instant,
}

#[derive(Debug, Clone)]
struct ActiveFeedback {
    position: usize,
    verdict: Verdict,
    advance_at: Instant,
}

/// One timed assessment session.
#[derive(Debug)]
pub struct ExamSession {
    id: Uuid,
    config: SessionConfig,
    questions: Vec<Question>,
    index_of: HashMap<u32, usize>,
    slots: Vec<Slot>,
    state: SessionState,
    current: usize,
    entered_at: Option<Instant>,
    started_at: Option<Instant>,
    clock: SessionClock,
    transition: Option<Transition>,
    feedback: Option<ActiveFeedback>,
    deferred_finish: Option<FinishReason>,
    summary: Option<FinishSummary>,
    events: Vec<SessionEvent>,
}

impl ExamSession {
    /// Create a session over `questions`. Repeated numbers keep their first
    /// occurrence.
    pub fn new(config: SessionConfig, questions: Vec<Question>) -> Self {
        let mut seen = HashSet::new();
        let questions: Vec<Question> = questions
            .into_iter()
            .filter(|q| seen.insert(q.number))
            .collect();
        let index_of = questions
            .iter()
            .enumerate()
            .map(|(i, q)| (q.number, i))
            .collect();
        let clock = SessionClock::for_regime(config.clock, questions.len());

        Self {
            id: Uuid::new_v4(),
            slots: vec![Slot::default(); questions.len()],
            config,
            questions,
            index_of,
            state: SessionState::NotStarted,
            current: 0,
            entered_at: None,
            started_at: None,
            clock,
            transition: None,
            feedback: None,
            deferred_finish: None,
            summary: None,
            events: Vec::new(),
        }
    }

    /// Create a session from a range expression or explicit list.
    pub fn from_source(config: SessionConfig, source: &QuestionSource) -> Self {
        Self::new(config, resolve_questions(source))
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// `NotStarted → Active`.
    pub fn start(&mut self, now: Instant) -> Result<(), SessionError> {
        if self.state != SessionState::NotStarted {
            return Err(SessionError::AlreadyStarted);
        }
        if self.questions.is_empty() {
            return Err(SessionError::EmptyQuestionSet);
        }
        self.state = SessionState::Active;
        self.started_at = Some(now);
        self.enter(0, now);
        tracing::info!(
            session_id = %self.id,
            mode = %self.config.mode,
            questions = self.questions.len(),
            "session started"
        );
        self.events.push(SessionEvent::Started {
            session_id: self.id,
            question_count: self.questions.len(),
            total_secs: self.clock.remaining(),
        });
        Ok(())
    }

    /// Advance the clock by one second. Expiry forces the finish.
    pub fn tick(&mut self, now: Instant) {
        if self.state != SessionState::Active {
            return;
        }
        match self.clock.tick() {
            Tick::Running { remaining } => {
                self.events.push(SessionEvent::Tick {
                    remaining_secs: remaining,
                });
            }
            Tick::Warning { remaining } => {
                self.events.push(SessionEvent::Tick {
                    remaining_secs: remaining,
                });
                self.events.push(SessionEvent::Cue {
                    cue: Cue::TimeWarning,
                });
            }
            Tick::Expired => {
                self.events.push(SessionEvent::Tick { remaining_secs: 0 });
                self.request_finish(FinishReason::TimeUp, now);
            }
        }
    }

    /// Manual submission. Returns false when the session is not active.
    pub fn submit(&mut self, now: Instant) -> bool {
        if self.state != SessionState::Active {
            return false;
        }
        self.request_finish(FinishReason::Submitted, now);
        true
    }

    fn request_finish(&mut self, reason: FinishReason, now: Instant) {
        if self.state != SessionState::Active {
            return;
        }
        if self.transition.is_some() {
            if self.deferred_finish.is_none() {
                self.deferred_finish = Some(reason);
                self.events.push(SessionEvent::FinishDeferred { reason });
            }
            return;
        }
        self.finish(reason, now);
    }

    fn finish(&mut self, reason: FinishReason, now: Instant) {
        if self.state != SessionState::Active {
            return;
        }
        self.leave_current(now);
        self.transition = None;
        self.feedback = None;
        self.deferred_finish = None;
        self.state = SessionState::Finished;

        let duration_secs = self
            .started_at
            .map(|s| now.saturating_duration_since(s).as_secs())
            .unwrap_or(0);
        let skipped: Vec<u32> = self
            .questions
            .iter()
            .zip(&self.slots)
            .filter(|(_, slot)| slot.answer.is_none())
            .map(|(q, _)| q.number)
            .collect();
        let summary = FinishSummary {
            reason,
            duration_secs,
            solved_count: self.questions.len() - skipped.len(),
            skipped,
        };

        tracing::info!(
            session_id = %self.id,
            ?reason,
            duration_secs,
            solved = summary.solved_count,
            "session finished"
        );
        if reason == FinishReason::TimeUp {
            self.events.push(SessionEvent::Cue { cue: Cue::TimeUp });
        }
        self.events.push(SessionEvent::Finished(summary.clone()));
        self.summary = Some(summary);
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    pub fn next(&mut self, now: Instant) -> NavOutcome {
        if let Some(blocked) = self.nav_guard() {
            return blocked;
        }
        if self.current + 1 >= self.questions.len() {
            self.request_finish(FinishReason::LastQuestion, now);
            return NavOutcome::Finished;
        }
        self.begin_transition(self.current + 1, now)
    }

    pub fn previous(&mut self, now: Instant) -> NavOutcome {
        if let Some(blocked) = self.nav_guard() {
            return blocked;
        }
        if self.current == 0 {
            return NavOutcome::Ignored;
        }
        self.begin_transition(self.current - 1, now)
    }

    /// Jump to a position. Targets outside the sequence are ignored.
    pub fn jump_to(&mut self, index: usize, now: Instant) -> NavOutcome {
        if let Some(blocked) = self.nav_guard() {
            return blocked;
        }
        if index >= self.questions.len() || index == self.current {
            return NavOutcome::Ignored;
        }
        self.begin_transition(index, now)
    }

    /// Land the in-flight transition. Applies a deferred finish afterwards.
    pub fn complete_transition(&mut self, now: Instant) -> bool {
        if self.state != SessionState::Active {
            return false;
        }
        let Some(transition) = self.transition.take() else {
            return false;
        };
        let from = self.current;
        self.enter(transition.target, now);
        self.events.push(SessionEvent::Navigated {
            from,
            to: transition.target,
        });
        if let Some(reason) = self.deferred_finish.take() {
            self.finish(reason, now);
        }
        true
    }

    /// Move on once the feedback delay has elapsed.
    pub fn auto_advance(&mut self, now: Instant) -> NavOutcome {
        match &self.feedback {
            Some(fb) if now >= fb.advance_at => {
                self.feedback = None;
                self.next(now)
            }
            _ => NavOutcome::Ignored,
        }
    }

    /// Toggle the review flag on the current question.
    pub fn mark_for_review(&mut self) -> Result<bool, SessionError> {
        self.ensure_active()?;
        let slot = &mut self.slots[self.current];
        slot.marked = !slot.marked;
        let marked = slot.marked;
        self.events.push(SessionEvent::MarkedForReview {
            number: self.questions[self.current].number,
            marked,
        });
        Ok(marked)
    }

    fn nav_guard(&self) -> Option<NavOutcome> {
        if self.state != SessionState::Active {
            return Some(NavOutcome::Ignored);
        }
        if self.transition.is_some() {
            return Some(NavOutcome::Busy);
        }
        None
    }

    fn begin_transition(&mut self, target: usize, now: Instant) -> NavOutcome {
        self.leave_current(now);
        self.feedback = None;
        self.transition = Some(Transition {
            target,
            completes_at: now + self.config.nav_debounce,
        });
        if self.config.nav_debounce.is_zero() {
            self.complete_transition(now);
        }
        NavOutcome::Started { target }
    }

    fn enter(&mut self, position: usize, now: Instant) {
        self.current = position;
        self.entered_at = Some(now);
        self.slots[position].visited = true;
    }

    fn leave_current(&mut self, now: Instant) {
        if let Some(entered) = self.entered_at.take() {
            self.slots[self.current].time_spent += now.saturating_duration_since(entered);
        }
    }

    // -----------------------------------------------------------------------
    // Answers
    // -----------------------------------------------------------------------

    /// Record an answer for the current question.
    ///
    /// Outside mock mode this also returns the immediate feedback verdict.
    pub fn answer(
        &mut self,
        answer: Answer,
        now: Instant,
    ) -> Result<Option<Verdict>, SessionError> {
        self.ensure_input_allowed()?;
        let question = &self.questions[self.current];

        match (question.kind, &answer) {
            (QuestionKind::MultiChoice, Answer::Single(_))
            | (QuestionKind::Mcq | QuestionKind::Num, Answer::Multi(_)) => {
                return Err(SessionError::AnswerKindMismatch {
                    number: question.number,
                    kind: question.kind,
                });
            }
            _ => {}
        }

        // Numeric answers keep what was typed; comparison normalizes later.
        let captured = match answer {
            Answer::Single(value) if question.kind == QuestionKind::Num => {
                Answer::Single(value.trim().to_string())
            }
            other => normalize(Some(&other)),
        };
        if let Some(bad) = invalid_option(question, &captured) {
            return Err(SessionError::UnknownOption {
                number: question.number,
                option: bad,
            });
        }

        let stored = (!captured.is_empty()).then_some(captured);
        Ok(self.store_answer(stored, now))
    }

    /// Add or remove one option of a multi-choice answer.
    pub fn toggle_option(
        &mut self,
        option: &str,
        now: Instant,
    ) -> Result<Option<Verdict>, SessionError> {
        self.ensure_input_allowed()?;
        let question = &self.questions[self.current];
        if question.kind != QuestionKind::MultiChoice {
            return Err(SessionError::AnswerKindMismatch {
                number: question.number,
                kind: question.kind,
            });
        }

        let option = normalize_scalar(option);
        let mut selected = match &self.slots[self.current].answer {
            Some(Answer::Multi(v)) => v.clone(),
            _ => Vec::new(),
        };
        if let Some(pos) = selected.iter().position(|o| *o == option) {
            selected.remove(pos);
        } else {
            selected.push(option);
        }
        self.answer(Answer::Multi(selected), now)
    }

    /// Clear the current question's answer.
    pub fn clear_answer(&mut self) -> Result<(), SessionError> {
        self.ensure_input_allowed()?;
        if self.feedback_position() == Some(self.current) {
            self.feedback = None;
        }
        self.slots[self.current].answer = None;
        self.events.push(SessionEvent::AnswerRecorded {
            number: self.questions[self.current].number,
            answer: None,
        });
        Ok(())
    }

    fn store_answer(&mut self, stored: Option<Answer>, now: Instant) -> Option<Verdict> {
        let position = self.current;
        let question = &self.questions[position];
        let number = question.number;
        self.slots[position].answer = stored.clone();
        self.events.push(SessionEvent::AnswerRecorded {
            number,
            answer: stored.clone(),
        });

        if self.config.mode == PracticeMode::Mock {
            return None;
        }
        let Some(stored) = stored else {
            if self.feedback.as_ref().is_some_and(|fb| fb.position == position) {
                self.feedback = None;
            }
            return None;
        };

        let verdict = feedback::evaluate(question, &stored, self.config.answer_key.as_ref());
        match &mut self.feedback {
            // Multi-choice re-selection keeps the original deadline.
            Some(fb) if fb.position == position => fb.verdict = verdict.clone(),
            _ => {
                self.feedback = Some(ActiveFeedback {
                    position,
                    verdict: verdict.clone(),
                    advance_at: now + verdict.advance_delay(),
                });
            }
        }

        let cue = match verdict {
            Verdict::Correct => Cue::Correct,
            Verdict::Incorrect { .. } => Cue::Incorrect,
            Verdict::Ungraded => Cue::Neutral,
        };
        self.events.push(SessionEvent::FeedbackShown {
            number,
            verdict: verdict.clone(),
        });
        self.events.push(SessionEvent::Cue { cue });
        Some(verdict)
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        if self.state != SessionState::Active {
            return Err(SessionError::NotActive);
        }
        Ok(())
    }

    fn ensure_input_allowed(&self) -> Result<(), SessionError> {
        self.ensure_active()?;
        if self.transition.is_some() {
            return Err(SessionError::Navigating);
        }
        let question = &self.questions[self.current];
        if self.feedback_position() == Some(self.current)
            && question.kind != QuestionKind::MultiChoice
        {
            return Err(SessionError::InputLocked(question.number));
        }
        Ok(())
    }

    fn feedback_position(&self) -> Option<usize> {
        self.feedback.as_ref().map(|fb| fb.position)
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn mode(&self) -> PracticeMode {
        self.config.mode
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn answer_key(&self) -> Option<&AnswerKey> {
        self.config.answer_key.as_ref()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current)
    }

    pub fn remaining_secs(&self) -> u64 {
        self.clock.remaining()
    }

    /// When the in-flight transition should land.
    pub fn transition_deadline(&self) -> Option<Instant> {
        self.transition.as_ref().map(|t| t.completes_at)
    }

    /// When visible feedback should auto-advance.
    pub fn feedback_deadline(&self) -> Option<Instant> {
        self.feedback.as_ref().map(|fb| fb.advance_at)
    }

    pub fn feedback(&self) -> Option<&Verdict> {
        self.feedback.as_ref().map(|fb| &fb.verdict)
    }

    pub fn summary(&self) -> Option<&FinishSummary> {
        self.summary.as_ref()
    }

    pub fn answer_for(&self, number: u32) -> Option<&Answer> {
        let i = *self.index_of.get(&number)?;
        self.slots[i].answer.as_ref()
    }

    pub fn is_visited(&self, number: u32) -> bool {
        self.index_of
            .get(&number)
            .is_some_and(|&i| self.slots[i].visited)
    }

    /// Snapshot of captured answers keyed by question number.
    pub fn answers(&self) -> AnswerRecord {
        self.questions
            .iter()
            .zip(&self.slots)
            .filter_map(|(q, slot)| slot.answer.clone().map(|a| (q.number, a)))
            .collect()
    }

    /// Whole seconds spent per visited question, rounded to nearest.
    pub fn timings(&self) -> TimingRecord {
        self.questions
            .iter()
            .zip(&self.slots)
            .filter(|(_, slot)| slot.visited)
            .map(|(q, slot)| {
                let secs = (slot.time_spent.as_millis() + 500) / 1000;
                (q.number, secs as u64)
            })
            .collect()
    }

    pub fn marked_for_review(&self) -> BTreeSet<u32> {
        self.questions
            .iter()
            .zip(&self.slots)
            .filter(|(_, slot)| slot.marked)
            .map(|(q, _)| q.number)
            .collect()
    }

    /// Take the queued events.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }
}

/// Returns the first selected option the question does not offer. Options
/// are addressed by letter, `A` being the first.
fn invalid_option(question: &Question, answer: &Answer) -> Option<String> {
    if question.kind == QuestionKind::Num || question.options.is_empty() {
        return None;
    }
    let offered: Vec<String> = (0..question.options.len())
        .filter_map(|i| char::from_u32('A' as u32 + i as u32))
        .map(String::from)
        .collect();
    let selected = match answer {
        Answer::Single(s) if s.is_empty() => Vec::new(),
        Answer::Single(s) => vec![s.clone()],
        Answer::Multi(v) => normalize_options(v),
    };
    selected.into_iter().find(|s| !offered.contains(s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockRegime;

    fn numeric(number: u32) -> Question {
        Question {
            number,
            text: format!("Numeric {number}"),
            options: vec![],
            kind: QuestionKind::Num,
            subject: None,
            chapter: None,
        }
    }

    fn multi(number: u32) -> Question {
        let mut q = Question::placeholder(number);
        q.kind = QuestionKind::MultiChoice;
        q
    }

    fn key() -> AnswerKey {
        [
            (1, Answer::single("A")),
            (2, Answer::multi(["A", "C"])),
            (3, Answer::single("7")),
        ]
        .into_iter()
        .collect()
    }

    fn questions() -> Vec<Question> {
        vec![Question::placeholder(1), multi(2), numeric(3)]
    }

    fn practice(t0: Instant) -> ExamSession {
        let config = SessionConfig::custom("Algebra", 60).with_answer_key(key());
        let mut s = ExamSession::new(config, questions());
        s.start(t0).unwrap();
        s
    }

    fn mock(t0: Instant, total_secs: u64) -> ExamSession {
        let config =
            SessionConfig::mock("Full syllabus").with_clock(ClockRegime::Fixed { total_secs });
        let mut s = ExamSession::new(config, questions());
        s.start(t0).unwrap();
        s
    }

    fn secs(t0: Instant, s: u64) -> Instant {
        t0 + Duration::from_secs(s)
    }

    fn finished_count(events: &[SessionEvent]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, SessionEvent::Finished(_)))
            .count()
    }

    #[test]
    fn empty_sequence_cannot_start() {
        let mut s = ExamSession::from_source(
            SessionConfig::mock("x"),
            &QuestionSource::Range("9-1".into()),
        );
        assert_eq!(s.start(Instant::now()), Err(SessionError::EmptyQuestionSet));
        assert_eq!(s.state(), SessionState::NotStarted);
    }

    #[test]
    fn start_only_once() {
        let t0 = Instant::now();
        let mut s = practice(t0);
        assert_eq!(s.start(t0), Err(SessionError::AlreadyStarted));
        assert_eq!(s.remaining_secs(), 180);
    }

    #[test]
    fn clock_expiry_finishes_exactly_once() {
        let t0 = Instant::now();
        let mut s = mock(t0, 5);
        for i in 1..=5 {
            s.tick(secs(t0, i));
        }
        assert_eq!(s.state(), SessionState::Finished);
        s.tick(secs(t0, 6));
        assert!(!s.submit(secs(t0, 6)));
        let events = s.drain_events();
        assert_eq!(finished_count(&events), 1);
        let summary = s.summary().unwrap();
        assert_eq!(summary.reason, FinishReason::TimeUp);
        assert_eq!(summary.duration_secs, 5);
        assert_eq!(summary.skipped, vec![1, 2, 3]);
    }

    #[test]
    fn navigation_is_debounced() {
        let t0 = Instant::now();
        let mut s = mock(t0, 600);
        assert_eq!(s.next(secs(t0, 10)), NavOutcome::Started { target: 1 });
        assert_eq!(s.next(secs(t0, 10)), NavOutcome::Busy);
        assert_eq!(s.jump_to(2, secs(t0, 10)), NavOutcome::Busy);
        assert_eq!(s.current_index(), 0);
        assert!(s.complete_transition(s.transition_deadline().unwrap()));
        assert_eq!(s.current_index(), 1);
        assert!(!s.complete_transition(secs(t0, 11)));
    }

    #[test]
    fn revisits_accumulate_time() {
        let t0 = Instant::now();
        let mut s = mock(t0, 600).tap_zero_debounce();
        s.next(secs(t0, 10));
        s.previous(secs(t0, 15));
        s.next(secs(t0, 40));
        let timings = s.timings();
        // 10s on the first visit plus 25s on the second.
        assert_eq!(timings.get(&1), Some(&35));
        assert_eq!(timings.get(&2), Some(&5));
        assert!(!timings.contains_key(&3));
        assert!(s.is_visited(2));
        assert!(!s.is_visited(3));
    }

    #[test]
    fn out_of_range_jumps_are_ignored() {
        let t0 = Instant::now();
        let mut s = mock(t0, 600);
        assert_eq!(s.jump_to(3, t0), NavOutcome::Ignored);
        assert_eq!(s.jump_to(0, t0), NavOutcome::Ignored);
        assert_eq!(s.previous(t0), NavOutcome::Ignored);
        assert_eq!(s.jump_to(2, t0), NavOutcome::Started { target: 2 });
    }

    #[test]
    fn next_on_last_question_finishes() {
        let t0 = Instant::now();
        let mut s = mock(t0, 600).tap_zero_debounce();
        s.jump_to(2, secs(t0, 1));
        assert_eq!(s.next(secs(t0, 2)), NavOutcome::Finished);
        assert_eq!(s.state(), SessionState::Finished);
        assert_eq!(s.summary().unwrap().reason, FinishReason::LastQuestion);
        assert_eq!(s.next(secs(t0, 3)), NavOutcome::Ignored);
    }

    #[test]
    fn expiry_during_transition_is_deferred_then_forced() {
        let t0 = Instant::now();
        let mut s = mock(t0, 2);
        s.tick(secs(t0, 1));
        s.next(secs(t0, 1));
        s.tick(secs(t0, 2));
        assert_eq!(s.state(), SessionState::Active);
        assert!(s.submit(secs(t0, 2)));
        assert!(s.complete_transition(secs(t0, 2)));
        assert_eq!(s.state(), SessionState::Finished);
        assert_eq!(s.current_index(), 1);
        let events = s.drain_events();
        assert_eq!(finished_count(&events), 1);
        assert_eq!(s.summary().unwrap().reason, FinishReason::TimeUp);
    }

    #[test]
    fn mock_mode_shows_no_feedback() {
        let t0 = Instant::now();
        let mut s = mock(t0, 600);
        assert_eq!(s.answer(Answer::single("b"), t0), Ok(None));
        assert_eq!(s.answer_for(1), Some(&Answer::single("B")));
        assert_eq!(s.answer(Answer::single("a"), t0), Ok(None));
        assert!(s.feedback().is_none());
    }

    #[test]
    fn practice_feedback_locks_single_choice_input() {
        let t0 = Instant::now();
        let mut s = practice(t0);
        let verdict = s.answer(Answer::single("1"), t0).unwrap();
        assert_eq!(verdict, Some(Verdict::Correct));
        assert_eq!(
            s.answer(Answer::single("B"), t0),
            Err(SessionError::InputLocked(1))
        );
        assert_eq!(s.clear_answer(), Err(SessionError::InputLocked(1)));
        assert_eq!(
            s.feedback_deadline(),
            Some(t0 + feedback::GRADED_ADVANCE_DELAY)
        );
    }

    #[test]
    fn feedback_auto_advances_after_delay() {
        let t0 = Instant::now();
        let mut s = practice(t0);
        s.answer(Answer::single("D"), t0).unwrap();
        assert_eq!(s.auto_advance(t0), NavOutcome::Ignored);
        let due = s.feedback_deadline().unwrap();
        assert_eq!(s.auto_advance(due), NavOutcome::Started { target: 1 });
        assert!(s.feedback().is_none());
    }

    #[test]
    fn multi_choice_stays_open_during_feedback() {
        let t0 = Instant::now();
        let mut s = practice(t0).tap_zero_debounce();
        s.next(t0);
        let first = s.toggle_option("c", t0).unwrap();
        assert!(matches!(first, Some(Verdict::Incorrect { .. })));
        let deadline = s.feedback_deadline();
        let second = s.toggle_option("A", secs(t0, 1)).unwrap();
        assert_eq!(second, Some(Verdict::Correct));
        assert_eq!(s.feedback_deadline(), deadline);
        assert_eq!(s.answer_for(2), Some(&Answer::multi(["A", "C"])));
    }

    #[test]
    fn ungraded_feedback_waits_longer() {
        let t0 = Instant::now();
        let config = SessionConfig::custom("Algebra", 60);
        let mut s = ExamSession::new(config, questions());
        s.start(t0).unwrap();
        assert_eq!(
            s.answer(Answer::single("C"), t0).unwrap(),
            Some(Verdict::Ungraded)
        );
        assert_eq!(
            s.feedback_deadline(),
            Some(t0 + feedback::UNGRADED_ADVANCE_DELAY)
        );
    }

    #[test]
    fn answer_shape_must_match_kind() {
        let t0 = Instant::now();
        let mut s = mock(t0, 600);
        assert_eq!(
            s.answer(Answer::multi(["A"]), t0),
            Err(SessionError::AnswerKindMismatch {
                number: 1,
                kind: QuestionKind::Mcq
            })
        );
        assert!(matches!(
            s.toggle_option("A", t0),
            Err(SessionError::AnswerKindMismatch { .. })
        ));
        assert!(matches!(
            s.answer(Answer::single("E"), t0),
            Err(SessionError::UnknownOption { .. })
        ));
    }

    #[test]
    fn numeric_answers_accept_free_values() {
        let t0 = Instant::now();
        let mut s = mock(t0, 600).tap_zero_debounce();
        s.jump_to(2, t0);
        s.answer(Answer::single("12.75"), t0).unwrap();
        assert_eq!(s.answer_for(3), Some(&Answer::single("12.75")));
    }

    #[test]
    fn numeric_digit_answers_are_kept_verbatim() {
        let t0 = Instant::now();
        let mut s = practice(t0).tap_zero_debounce();
        s.jump_to(2, t0);
        assert_eq!(
            s.answer(Answer::single(" 2 "), t0).unwrap(),
            Some(Verdict::Incorrect {
                expected: Answer::single("7")
            })
        );
        assert_eq!(s.answer_for(3), Some(&Answer::single("2")));
        let flattened = crate::traits::flatten_answers(&s.answers());
        assert_eq!(flattened.get("3").map(String::as_str), Some("2"));
    }

    #[test]
    fn deselecting_every_option_drops_feedback() {
        let t0 = Instant::now();
        let mut s = practice(t0).tap_zero_debounce();
        s.next(t0);
        s.toggle_option("A", t0).unwrap();
        assert!(s.feedback().is_some());
        assert_eq!(s.toggle_option("A", t0).unwrap(), None);
        assert!(s.feedback().is_none());
        assert!(s.feedback_deadline().is_none());
        assert_eq!(s.answer_for(2), None);
    }

    #[test]
    fn blank_answer_clears_entry() {
        let t0 = Instant::now();
        let mut s = mock(t0, 600);
        s.answer(Answer::single("A"), t0).unwrap();
        s.answer(Answer::single("  "), t0).unwrap();
        assert!(s.answers().is_empty());
    }

    #[test]
    fn input_rejected_mid_transition() {
        let t0 = Instant::now();
        let mut s = mock(t0, 600);
        s.next(t0);
        assert_eq!(
            s.answer(Answer::single("A"), t0),
            Err(SessionError::Navigating)
        );
    }

    #[test]
    fn review_marks_toggle_and_do_not_count_as_answers() {
        let t0 = Instant::now();
        let mut s = mock(t0, 600);
        assert_eq!(s.mark_for_review(), Ok(true));
        assert_eq!(s.marked_for_review(), BTreeSet::from([1]));
        assert_eq!(s.mark_for_review(), Ok(false));
        assert!(s.marked_for_review().is_empty());
        s.mark_for_review().unwrap();
        s.submit(t0);
        assert_eq!(s.summary().unwrap().solved_count, 0);
    }

    #[test]
    fn finished_session_rejects_input() {
        let t0 = Instant::now();
        let mut s = mock(t0, 600);
        s.submit(t0);
        assert_eq!(
            s.answer(Answer::single("A"), t0),
            Err(SessionError::NotActive)
        );
        assert_eq!(s.mark_for_review(), Err(SessionError::NotActive));
    }

    trait ZeroDebounce {
        fn tap_zero_debounce(self) -> Self;
    }

    impl ZeroDebounce for ExamSession {
        fn tap_zero_debounce(mut self) -> Self {
            self.config.nav_debounce = Duration::ZERO;
            self
        }
    }
}
