pub mod grade;
pub mod grade_image;
pub mod init;
pub mod list_models;
pub mod resolve;
pub mod run;
pub mod validate;

use std::path::Path;

use anyhow::{Context, Result};

use examdrill_core::model::{AnswerRecord, Paper, PracticeMode, TimingRecord};
use examdrill_core::parser;
use examdrill_core::report::SessionReport;

/// Load a paper, applying `--key` and `--mode` overrides.
pub(crate) fn load_paper(path: &Path, key: Option<&Path>, mode: Option<&str>) -> Result<Paper> {
    let mut paper = parser::parse_paper(path)?;

    if let Some(key_path) = key {
        let text = std::fs::read_to_string(key_path)
            .with_context(|| format!("failed to read answer key: {}", key_path.display()))?;
        let key = parser::parse_answer_key(&text);
        anyhow::ensure!(
            !key.is_empty(),
            "answer key {} has no usable entries",
            key_path.display()
        );
        paper.answer_key = Some(key);
    }

    if let Some(mode) = mode {
        paper.mode = mode.parse::<PracticeMode>().map_err(anyhow::Error::msg)?;
    }

    Ok(paper)
}

/// Read an answer sheet. A saved session report contributes its timings too.
pub(crate) fn load_answers(path: &Path) -> Result<(AnswerRecord, TimingRecord)> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read answers: {}", path.display()))?;

    if let Ok(report) = serde_json::from_str::<SessionReport>(&text) {
        tracing::debug!(session_id = %report.session_id, "answers taken from session report");
        return Ok((report.answers, report.timings));
    }

    Ok((parser::parse_answer_record(&text), TimingRecord::new()))
}
