//! The `examdrill list-models` command.

use std::path::PathBuf;

use anyhow::Result;

use examdrill_grader::config::load_config_from;
use examdrill_grader::create_grader;

pub fn execute(provider_filter: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_from(config_path.as_deref())?;

    let mut names: Vec<&String> = config.providers.keys().collect();
    names.sort();

    let mut found_any = false;
    for name in names {
        if provider_filter.as_ref().is_some_and(|f| f != name) {
            continue;
        }

        let grader = create_grader(name, &config.providers[name])?;
        let models = grader.available_models();
        if models.is_empty() {
            continue;
        }

        found_any = true;
        let marker = if *name == config.default_provider {
            " (default)"
        } else {
            ""
        };
        println!("Provider: {name}{marker}");
        for model in &models {
            println!(
                "  {}: {} ({}K context, ${:.4}/{:.4} per 1K tokens)",
                model.id,
                model.name,
                model.max_context / 1000,
                model.cost_per_1k_input,
                model.cost_per_1k_output,
            );
        }
        println!();
    }

    if !found_any {
        println!("No grading providers configured. Run `examdrill init` to create a config file.");
    }

    Ok(())
}
