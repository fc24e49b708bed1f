//! examdrill CLI: timed exam practice from the terminal.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "examdrill",
    version,
    about = "Timed exam practice with grading and re-attempt planning"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sit a paper interactively on stdin
    Run {
        /// Paper TOML file
        #[arg(long)]
        paper: PathBuf,

        /// Answer key file (JSON or `1:A, 2:B` text), overrides the paper's key
        #[arg(long)]
        key: Option<PathBuf>,

        /// Practice mode override: mock or custom
        #[arg(long)]
        mode: Option<String>,

        /// Per-question time budget in seconds (custom mode)
        #[arg(long)]
        per_question_secs: Option<u64>,

        /// Answer-key image to grade with when the paper has no key
        #[arg(long)]
        key_image: Option<PathBuf>,

        /// Grading provider for --key-image
        #[arg(long)]
        provider: Option<String>,

        /// Grading model for --key-image
        #[arg(long)]
        model: Option<String>,

        /// Output directory for the session report
        #[arg(long)]
        output: Option<PathBuf>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Grade an answer sheet against a key without a live session
    Grade {
        /// Paper TOML file
        #[arg(long)]
        paper: PathBuf,

        /// Answers file: JSON map, `1:A` text, or a saved session report
        #[arg(long)]
        answers: PathBuf,

        /// Answer key file, overrides the paper's key
        #[arg(long)]
        key: Option<PathBuf>,

        /// Practice mode override: mock or custom
        #[arg(long)]
        mode: Option<String>,

        /// Output format: table or json
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Grade an answer sheet with an AI service reading a key image
    GradeImage {
        /// Answers file: JSON map, `1:A` text, or a saved session report
        #[arg(long)]
        answers: PathBuf,

        /// Photo or scan of the answer key
        #[arg(long)]
        image: PathBuf,

        /// Syllabus description sent with the request
        #[arg(long, default_value = "")]
        syllabus: String,

        /// Grading provider (defaults to config)
        #[arg(long)]
        provider: Option<String>,

        /// Grading model (defaults to config)
        #[arg(long)]
        model: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the question sequence a range expression resolves to
    Resolve {
        /// Range expression, e.g. "1-5, 8, 10-12"
        expression: String,
    },

    /// Validate paper TOML files
    Validate {
        /// Paper file or directory
        #[arg(long)]
        paper: PathBuf,
    },

    /// List available grading models
    ListModels {
        /// Filter to specific provider
        #[arg(long)]
        provider: Option<String>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create starter config and example paper
    Init,
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("examdrill=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            paper,
            key,
            mode,
            per_question_secs,
            key_image,
            provider,
            model,
            output,
            config,
        } => {
            commands::run::execute(commands::run::RunArgs {
                paper,
                key,
                mode,
                per_question_secs,
                key_image,
                provider,
                model,
                output,
                config,
            })
            .await
        }
        Commands::Grade {
            paper,
            answers,
            key,
            mode,
            format,
        } => commands::grade::execute(paper, answers, key, mode, format),
        Commands::GradeImage {
            answers,
            image,
            syllabus,
            provider,
            model,
            config,
        } => commands::grade_image::execute(answers, image, syllabus, provider, model, config).await,
        Commands::Resolve { expression } => commands::resolve::execute(&expression),
        Commands::Validate { paper } => commands::validate::execute(paper),
        Commands::ListModels { provider, config } => {
            commands::list_models::execute(provider, config)
        }
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
