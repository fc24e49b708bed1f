//! Session reports with JSON persistence, plus weakness tagging.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{AnswerRecord, ExamResult, PracticeMode, StudyTask, TimingRecord};
use crate::session::FinishSummary;
use crate::statistics::SessionStats;
use crate::traits::SessionHooks;

/// Everything worth keeping from one finished session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: Uuid,
    pub mode: PracticeMode,
    pub summary: FinishSummary,
    /// Absent while the session is still awaiting grading.
    #[serde(default)]
    pub result: Option<ExamResult>,
    #[serde(default)]
    pub stats: Option<SessionStats>,
    #[serde(default)]
    pub tasks: Vec<StudyTask>,
    #[serde(default)]
    pub marked_for_review: Vec<u32>,
    /// Captured answers, kept so the session can be graded later.
    #[serde(default)]
    pub answers: AnswerRecord,
    #[serde(default)]
    pub timings: TimingRecord,
}

impl SessionReport {
    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        save_json(self, path)
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        load_json(path)
    }

    /// Default file name under the output directory.
    pub fn file_name(&self) -> String {
        format!("session-{}.json", self.session_id)
    }

    /// Render a short markdown summary.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();
        md.push_str(&format!("## Session {} ({})\n\n", self.session_id, self.mode));
        md.push_str(&format!(
            "**Duration:** {}s, **solved:** {}, **skipped:** {}\n\n",
            self.summary.duration_secs,
            self.summary.solved_count,
            self.summary.skipped.len()
        ));

        match &self.result {
            Some(result) => {
                md.push_str(&format!("**Score:** {}\n\n", result.score));
                if !result.mistakes.is_empty() {
                    md.push_str(&format!("**Mistakes:** {}\n\n", result.mistakes.join(", ")));
                }
            }
            None => md.push_str("**Score:** awaiting grading\n\n"),
        }

        if !self.marked_for_review.is_empty() {
            let marked: Vec<String> = self.marked_for_review.iter().map(u32::to_string).collect();
            md.push_str(&format!("**Marked for review:** {}\n\n", marked.join(", ")));
        }

        if !self.tasks.is_empty() {
            md.push_str("### Re-attempt tasks\n\n");
            md.push_str("| Title | Due |\n");
            md.push_str("|-------|-----|\n");
            for task in &self.tasks {
                md.push_str(&format!("| {} | {} |\n", task.title, task.date));
            }
        }

        md
    }
}

impl ExamResult {
    pub fn save_json(&self, path: &Path) -> Result<()> {
        save_json(self, path)
    }

    pub fn load_json(path: &Path) -> Result<Self> {
        load_json(path)
    }
}

fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize report")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    Ok(())
}

fn load_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read report from {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse report JSON in {}", path.display()))
}

/// Collects topic tags for missed questions of one result.
#[derive(Debug, Default)]
pub struct WeaknessTracker {
    mistakes: BTreeSet<u32>,
    tags: BTreeMap<u32, BTreeSet<String>>,
}

impl WeaknessTracker {
    /// Track the mistakes of `result`. Non-numeric entries are ignored.
    pub fn for_result(result: &ExamResult) -> Self {
        Self {
            mistakes: result
                .mistakes
                .iter()
                .filter_map(|m| m.trim().parse().ok())
                .collect(),
            tags: BTreeMap::new(),
        }
    }

    /// Tag a missed question with topics and report the newly added ones.
    /// Returns false when `number` was not a mistake or nothing new was added.
    pub fn tag_mistake(&mut self, number: u32, topics: &[String], hooks: &dyn SessionHooks) -> bool {
        if !self.mistakes.contains(&number) {
            tracing::warn!(number, "ignoring weakness tag for a question that was not missed");
            return false;
        }
        let entry = self.tags.entry(number).or_default();
        let added: Vec<String> = topics
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .filter(|t| entry.insert(t.to_string()))
            .map(str::to_string)
            .collect();
        if added.is_empty() {
            return false;
        }
        hooks.on_update_weaknesses(&added);
        true
    }

    /// Topic → number of missed questions tagged with it.
    pub fn topic_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for topic in self.tags.values().flatten() {
            *counts.entry(topic.clone()).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::Utc;

    use super::*;
    use crate::model::Answer;
    use crate::session::FinishReason;

    fn result() -> ExamResult {
        ExamResult {
            id: Uuid::nil(),
            date: Utc::now(),
            score: "4/12".into(),
            mistakes: vec!["2".into(), "3".into()],
            syllabus: "Algebra".into(),
            timings: BTreeMap::from([("1".into(), 20), ("2".into(), 35)]),
            analysis: None,
        }
    }

    fn report(result: Option<ExamResult>) -> SessionReport {
        SessionReport {
            session_id: Uuid::nil(),
            mode: PracticeMode::Custom,
            summary: FinishSummary {
                reason: FinishReason::Submitted,
                duration_secs: 55,
                solved_count: 2,
                skipped: vec![3],
            },
            result,
            stats: None,
            tasks: vec![],
            marked_for_review: vec![2],
            answers: AnswerRecord::from([(1, Answer::single("A")), (2, Answer::single("C"))]),
            timings: TimingRecord::from([(1, 20), (2, 35)]),
        }
    }

    #[derive(Default)]
    struct Recorder {
        updates: Mutex<Vec<Vec<String>>>,
    }

    impl SessionHooks for Recorder {
        fn on_update_weaknesses(&self, topics: &[String]) {
            self.updates.lock().unwrap().push(topics.to_vec());
        }
    }

    #[test]
    fn json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");
        let original = report(Some(result()));

        original.save_json(&path).unwrap();
        let loaded = SessionReport::load_json(&path).unwrap();

        assert_eq!(loaded.summary, original.summary);
        assert_eq!(loaded.answers, original.answers);
        assert_eq!(loaded.result.unwrap().score, "4/12");
    }

    #[test]
    fn result_json_uses_string_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("result.json");
        result().save_json(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"mistakes\""));
        assert!(raw.contains("\"2\": 35"));
        assert_eq!(ExamResult::load_json(&path).unwrap().mistakes, vec!["2", "3"]);
    }

    #[test]
    fn load_missing_file_has_context() {
        let err = SessionReport::load_json(Path::new("/nonexistent/report.json")).unwrap_err();
        assert!(format!("{err:#}").contains("failed to read report"));
    }

    #[test]
    fn markdown_mentions_pending_grading() {
        let md = report(None).to_markdown();
        assert!(md.contains("awaiting grading"));
        assert!(md.contains("Marked for review:** 2"));
    }

    #[test]
    fn tagging_only_applies_to_mistakes() {
        let hooks = Recorder::default();
        let mut tracker = WeaknessTracker::for_result(&result());

        assert!(tracker.tag_mistake(2, &["Quadratics".into()], &hooks));
        assert!(!tracker.tag_mistake(1, &["Linear".into()], &hooks));
        assert!(!tracker.tag_mistake(2, &["Quadratics".into()], &hooks));
        assert!(tracker.tag_mistake(3, &["Quadratics".into(), " ".into()], &hooks));

        assert_eq!(tracker.topic_counts()["Quadratics"], 2);
        assert_eq!(hooks.updates.lock().unwrap().len(), 2);
    }
}
