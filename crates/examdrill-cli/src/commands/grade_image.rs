//! The `examdrill grade-image` command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use examdrill_core::external::ExternalGradingAdapter;
use examdrill_core::traits::{ExternalGrader, GradingReport, KeyImage};
use examdrill_grader::config::load_config_from;
use examdrill_grader::{create_grader, ExamdrillConfig};

use super::load_answers;

pub async fn execute(
    answers_path: PathBuf,
    image_path: PathBuf,
    syllabus: String,
    provider: Option<String>,
    model: Option<String>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;
    let (answers, timings) = load_answers(&answers_path)?;
    anyhow::ensure!(
        !answers.is_empty(),
        "no answers found in {}",
        answers_path.display()
    );
    let key_image = read_key_image(&image_path)?;

    let adapter = build_adapter(&config, provider.as_deref(), model)?;
    eprintln!(
        "Grading {} answers with {} ...",
        answers.len(),
        adapter.grader_name()
    );

    let request = adapter.build_request(key_image, &answers, &timings, &syllabus);
    let response = adapter.grade(&request).await?;

    print_report(&response.report);
    eprintln!(
        "({} tokens, {}ms, {})",
        response.token_usage.total_tokens, response.latency_ms, response.model
    );
    Ok(())
}

pub(crate) fn read_key_image(path: &Path) -> Result<KeyImage> {
    let data = std::fs::read(path)
        .with_context(|| format!("failed to read key image: {}", path.display()))?;
    let extension = path.extension().and_then(|e| e.to_str());
    Ok(KeyImage::from_bytes(data, extension))
}

/// Resolve the configured grader and wrap it with the retry policy.
pub(crate) fn build_adapter(
    config: &ExamdrillConfig,
    provider: Option<&str>,
    model: Option<String>,
) -> Result<ExternalGradingAdapter> {
    let (name, provider_config) = config.provider(provider)?;
    let grader: Arc<dyn ExternalGrader> = create_grader(name, provider_config)?;
    let model = model.unwrap_or_else(|| config.default_model.clone());
    Ok(ExternalGradingAdapter::new(grader, model).with_retry_policy(config.retry_policy()))
}

pub(crate) fn print_report(report: &GradingReport) {
    println!("Score: {}", report.score_label());
    if !report.incorrect_questions.is_empty() {
        let numbers: Vec<String> = report
            .incorrect_questions
            .iter()
            .map(u32::to_string)
            .collect();
        println!("Incorrect: {}", numbers.join(", "));
    }
    for (chapter, score) in &report.chapter_scores {
        println!(
            "  {chapter}: {}/{} correct ({} attempted)",
            score.correct, score.total, score.attempted
        );
    }
    for suggestion in &report.suggestions {
        println!("  - {suggestion}");
    }
}
