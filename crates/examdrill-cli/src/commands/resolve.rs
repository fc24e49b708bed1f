//! The `examdrill resolve` command.

use anyhow::Result;

use examdrill_core::range::parse_range_expression;

pub fn execute(expression: &str) -> Result<()> {
    let numbers = parse_range_expression(expression);
    if numbers.is_empty() {
        println!("No questions: '{expression}' is not a valid range expression.");
        return Ok(());
    }

    let rendered: Vec<String> = numbers.iter().map(u32::to_string).collect();
    println!("{}", rendered.join(", "));
    println!("{} question(s)", numbers.len());
    Ok(())
}
