//! The `examdrill init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    if Path::new("examdrill.toml").exists() {
        println!("examdrill.toml already exists, skipping.");
    } else {
        std::fs::write("examdrill.toml", SAMPLE_CONFIG)?;
        println!("Created examdrill.toml");
    }

    std::fs::create_dir_all("papers")?;
    let example_path = Path::new("papers/example.toml");
    if example_path.exists() {
        println!("papers/example.toml already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_PAPER)?;
        println!("Created papers/example.toml");
    }

    println!("\nNext steps:");
    println!("  1. Edit examdrill.toml with your API keys (only needed for grade-image)");
    println!("  2. Run: examdrill validate --paper papers/example.toml");
    println!("  3. Run: examdrill run --paper papers/example.toml");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# examdrill configuration

default_provider = "anthropic"
default_model = "claude-sonnet-4-20250514"
max_retries = 3
retry_delay_ms = 1000
output_dir = "./examdrill-results"

[session]
nav_debounce_ms = 300
mock_duration_secs = 10800

[providers.anthropic]
type = "anthropic"
api_key = "${ANTHROPIC_API_KEY}"

[providers.openai]
type = "openai"
api_key = "${OPENAI_API_KEY}"
"#;

const EXAMPLE_PAPER: &str = r#"[paper]
id = "example"
name = "Example Practice Paper"
syllabus = "Kinematics and optics"
mode = "custom"
per_question_secs = 90
answer_key = "1:B, 2:9.8, 3:[A,C]"

[[questions]]
number = 1
text = "Which quantity is a vector?"
options = ["Speed", "Velocity", "Distance", "Time"]
subject = "Physics"
chapter = "Kinematics"

[[questions]]
number = 2
kind = "NUM"
text = "Acceleration due to gravity in m/s^2, to one decimal place."
subject = "Physics"
chapter = "Kinematics"

[[questions]]
number = 3
kind = "MULTI_CHOICE"
text = "Which mirrors can form a real image?"
options = ["Concave", "Plane", "Concave (object beyond F)", "Convex"]
subject = "Physics"
chapter = "Optics"

[source]
task_id = "hw-example"
title = "Example homework"
subject = "Physics"
"#;
