//! The `examdrill grade` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use comfy_table::{Cell, Table};

use examdrill_core::grading::{grade, GradeOutcome, QuestionStatus};
use examdrill_core::model::{AnswerKey, AnswerRecord, Question};
use examdrill_core::remediation::generate_remediation_tasks;
use examdrill_core::session::SessionConfig;
use examdrill_core::statistics::{build_analysis, SessionStats};

use super::{load_answers, load_paper};

pub fn execute(
    paper_path: PathBuf,
    answers_path: PathBuf,
    key_path: Option<PathBuf>,
    mode: Option<String>,
    format: String,
) -> Result<()> {
    anyhow::ensure!(
        matches!(format.as_str(), "table" | "json"),
        "unknown format '{format}', expected table or json"
    );

    let paper = load_paper(&paper_path, key_path.as_deref(), mode.as_deref())?;
    let key = paper
        .answer_key
        .clone()
        .filter(|k| !k.is_empty())
        .context("paper has no answer key; pass --key or use grade-image")?;

    let questions = paper.resolved_questions();
    anyhow::ensure!(!questions.is_empty(), "paper '{}' has no questions", paper.id);

    let (answers, timings) = load_answers(&answers_path)?;
    let outcome = grade(&questions, &answers, &key, paper.mode);
    let syllabus = SessionConfig::for_paper(&paper).syllabus;
    let result = outcome.to_result(
        &syllabus,
        &timings,
        Some(build_analysis(&questions, &outcome, &timings)),
    );
    let stats = SessionStats::compute(&outcome, &timings);
    let tasks = generate_remediation_tasks(
        paper.mode,
        Some(&key),
        &outcome,
        paper.source.as_ref(),
        chrono::Local::now().date_naive(),
    );

    if format == "json" {
        let body = serde_json::json!({
            "result": result,
            "stats": stats,
            "grades": outcome.per_question,
            "tasks": tasks,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!("{}", grade_table(&questions, &answers, &key, &outcome));
    println!("Score: {} ({} mode)", result.score, paper.mode);
    println!(
        "Correct {}, incorrect {}, unanswered {}, ungraded {} (accuracy {:.1}%)",
        stats.correct,
        stats.incorrect,
        stats.unanswered,
        stats.ungraded,
        stats.accuracy * 100.0
    );
    if !result.mistakes.is_empty() {
        println!("Mistakes: {}", result.mistakes.join(", "));
    }
    for task in &tasks {
        println!("Task due {}: {}", task.date, task.title);
    }

    Ok(())
}

pub(crate) fn grade_table(
    questions: &[Question],
    answers: &AnswerRecord,
    key: &AnswerKey,
    outcome: &GradeOutcome,
) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Q", "Kind", "Answer", "Key", "Status", "Marks"]);

    for (question, grade) in questions.iter().zip(&outcome.per_question) {
        let status = match grade.status {
            QuestionStatus::Correct => "correct",
            QuestionStatus::Incorrect => "incorrect",
            QuestionStatus::Unanswered => "unanswered",
            QuestionStatus::Ungraded => "ungraded",
        };
        table.add_row(vec![
            Cell::new(question.number),
            Cell::new(question.kind),
            Cell::new(answers.get(&question.number).map(|a| a.to_string()).unwrap_or_default()),
            Cell::new(key.get(question.number).map(|a| a.to_string()).unwrap_or_default()),
            Cell::new(status),
            Cell::new(grade.marks),
        ]);
    }

    table
}
