//! Session countdown clock.

use serde::{Deserialize, Serialize};

use crate::model::PracticeMode;

/// Default length of a full mock exam: 180 minutes.
pub const MOCK_EXAM_DURATION_SECS: u64 = 180 * 60;

/// Default per-question budget for custom practice: 2 minutes.
pub const DEFAULT_PER_QUESTION_SECS: u64 = 2 * 60;

/// Remaining time at which a one-shot warning cue fires.
pub const TIME_WARNING_SECS: u64 = 5 * 60;

/// How the session's time budget is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "regime", rename_all = "snake_case")]
pub enum ClockRegime {
    /// A fixed total, as used by mock exams.
    Fixed { total_secs: u64 },
    /// A budget per question, multiplied by the question count.
    PerQuestion { per_question_secs: u64 },
}

impl ClockRegime {
    /// Pick the regime for a mode. Mock exams use a fixed total; custom
    /// practice prefers a per-question budget, then a fixed total.
    pub fn for_mode(
        mode: PracticeMode,
        duration_secs: Option<u64>,
        per_question_secs: Option<u64>,
    ) -> Self {
        match (mode, per_question_secs, duration_secs) {
            (PracticeMode::Mock, _, total) => ClockRegime::Fixed {
                total_secs: total.unwrap_or(MOCK_EXAM_DURATION_SECS),
            },
            (PracticeMode::Custom, Some(per_question_secs), _) => {
                ClockRegime::PerQuestion { per_question_secs }
            }
            (PracticeMode::Custom, None, Some(total_secs)) => ClockRegime::Fixed { total_secs },
            (PracticeMode::Custom, None, None) => ClockRegime::PerQuestion {
                per_question_secs: DEFAULT_PER_QUESTION_SECS,
            },
        }
    }
}

impl Default for ClockRegime {
    fn default() -> Self {
        ClockRegime::Fixed {
            total_secs: MOCK_EXAM_DURATION_SECS,
        }
    }
}

/// What a tick did to the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Time remains.
    Running { remaining: u64 },
    /// The warning threshold was crossed on this tick.
    Warning { remaining: u64 },
    /// The counter is at zero.
    Expired,
}

/// Countdown of remaining seconds.
#[derive(Debug, Clone)]
pub struct SessionClock {
    remaining: u64,
    warn_at: Option<u64>,
}

impl SessionClock {
    pub fn new(total_secs: u64) -> Self {
        // Only warn when the session is long enough for the warning to mean something.
        let warn_at = (total_secs > TIME_WARNING_SECS).then_some(TIME_WARNING_SECS);
        Self {
            remaining: total_secs,
            warn_at,
        }
    }

    /// Build a clock for the given regime and question count.
    pub fn for_regime(regime: ClockRegime, question_count: usize) -> Self {
        let total = match regime {
            ClockRegime::Fixed { total_secs } => total_secs,
            ClockRegime::PerQuestion { per_question_secs } => {
                per_question_secs.saturating_mul(question_count as u64)
            }
        };
        Self::new(total)
    }

    /// Advance one second.
    pub fn tick(&mut self) -> Tick {
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            return Tick::Expired;
        }
        if self.warn_at == Some(self.remaining) {
            self.warn_at = None;
            return Tick::Warning {
                remaining: self.remaining,
            };
        }
        Tick::Running {
            remaining: self.remaining,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    pub fn is_expired(&self) -> bool {
        self.remaining == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_question_budget() {
        let clock = SessionClock::for_regime(
            ClockRegime::PerQuestion {
                per_question_secs: 90,
            },
            10,
        );
        assert_eq!(clock.remaining(), 900);
    }

    #[test]
    fn default_regime_is_three_hours() {
        let clock = SessionClock::for_regime(ClockRegime::default(), 75);
        assert_eq!(clock.remaining(), 10_800);
    }

    #[test]
    fn regime_selection_by_mode() {
        assert_eq!(
            ClockRegime::for_mode(PracticeMode::Mock, Some(60), None),
            ClockRegime::Fixed { total_secs: 60 }
        );
        assert_eq!(
            ClockRegime::for_mode(PracticeMode::Mock, None, None),
            ClockRegime::default()
        );
        assert_eq!(
            ClockRegime::for_mode(PracticeMode::Custom, Some(600), Some(90)),
            ClockRegime::PerQuestion {
                per_question_secs: 90
            }
        );
        assert_eq!(
            ClockRegime::for_mode(PracticeMode::Custom, None, None),
            ClockRegime::PerQuestion {
                per_question_secs: DEFAULT_PER_QUESTION_SECS
            }
        );
    }

    #[test]
    fn counts_down_to_expiry_and_saturates() {
        let mut clock = SessionClock::new(3);
        assert_eq!(clock.tick(), Tick::Running { remaining: 2 });
        assert_eq!(clock.tick(), Tick::Running { remaining: 1 });
        assert_eq!(clock.tick(), Tick::Expired);
        assert!(clock.is_expired());
        assert_eq!(clock.tick(), Tick::Expired);
        assert_eq!(clock.remaining(), 0);
    }

    #[test]
    fn warning_fires_once() {
        let mut clock = SessionClock::new(TIME_WARNING_SECS + 2);
        assert!(matches!(clock.tick(), Tick::Running { .. }));
        assert_eq!(
            clock.tick(),
            Tick::Warning {
                remaining: TIME_WARNING_SECS
            }
        );
        assert!(matches!(clock.tick(), Tick::Running { .. }));
    }

    #[test]
    fn short_sessions_never_warn() {
        let mut clock = SessionClock::new(TIME_WARNING_SECS);
        while !clock.is_expired() {
            assert!(!matches!(clock.tick(), Tick::Warning { .. }));
        }
    }
}
