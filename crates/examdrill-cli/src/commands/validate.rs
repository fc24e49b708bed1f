//! The `examdrill validate` command.

use std::path::PathBuf;

use anyhow::Result;

use examdrill_core::parser;

pub fn execute(paper_path: PathBuf) -> Result<()> {
    let papers = if paper_path.is_dir() {
        parser::load_paper_directory(&paper_path)?
    } else {
        vec![parser::parse_paper(&paper_path)?]
    };

    let mut total_warnings = 0;

    for paper in &papers {
        let questions = paper.resolved_questions();
        let key_entries = paper.answer_key.as_ref().map_or(0, |k| k.len());
        println!(
            "Paper: {} ({} questions, {} mode, {} key entries)",
            paper.name,
            questions.len(),
            paper.mode,
            key_entries
        );

        let warnings = parser::validate_paper(paper);
        for w in &warnings {
            let prefix = w
                .question
                .map(|n| format!("  [Q{n}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All papers valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
