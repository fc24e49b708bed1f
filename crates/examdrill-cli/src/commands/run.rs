//! The `examdrill run` command.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use examdrill_core::clock::ClockRegime;
use examdrill_core::engine::{
    EngineConfig, SessionCommand, SessionObserver, SessionOutcome, SessionRunner,
};
use examdrill_core::error::SessionError;
use examdrill_core::external::Resolution;
use examdrill_core::feedback::Verdict;
use examdrill_core::model::{Answer, ExamResult, PracticeMode, Question, StudyTask};
use examdrill_core::session::{Cue, ExamSession, SessionConfig, SessionEvent};
use examdrill_core::traits::SessionHooks;
use examdrill_grader::config::load_config_from;

use super::grade::grade_table;
use super::grade_image::{build_adapter, read_key_image};
use super::load_paper;

pub struct RunArgs {
    pub paper: PathBuf,
    pub key: Option<PathBuf>,
    pub mode: Option<String>,
    pub per_question_secs: Option<u64>,
    pub key_image: Option<PathBuf>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub output: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

/// Prints session events to stderr.
struct ConsoleObserver {
    questions: Vec<Question>,
}

impl ConsoleObserver {
    fn show_question(&self, index: usize) {
        let Some(q) = self.questions.get(index) else {
            return;
        };
        eprintln!(
            "\nQ{} ({}/{}) [{}] {}",
            q.number,
            index + 1,
            self.questions.len(),
            q.kind,
            q.text
        );
        for (i, option) in q.options.iter().enumerate() {
            if let Some(letter) = char::from_u32('A' as u32 + i as u32) {
                eprintln!("  {letter}) {option}");
            }
        }
    }
}

impl SessionObserver for ConsoleObserver {
    fn on_event(&self, event: &SessionEvent) {
        match event {
            SessionEvent::Started {
                question_count,
                total_secs,
                ..
            } => {
                eprintln!(
                    "Started: {question_count} question(s), {} on the clock. Type `help` for commands.",
                    format_clock(*total_secs)
                );
                self.show_question(0);
            }
            SessionEvent::Navigated { to, .. } => self.show_question(*to),
            SessionEvent::Tick { remaining_secs } if remaining_secs % 60 == 0 => {
                eprintln!("  [{} left]", format_clock(*remaining_secs));
            }
            SessionEvent::Tick { .. } => {}
            SessionEvent::AnswerRecorded {
                number,
                answer: Some(answer),
            } => eprintln!("  Q{number}: {answer}"),
            SessionEvent::AnswerRecorded { number, answer: None } => {
                eprintln!("  Q{number}: cleared")
            }
            SessionEvent::FeedbackShown { number, verdict } => match verdict {
                Verdict::Correct => eprintln!("  Q{number} correct"),
                Verdict::Incorrect { expected } => {
                    eprintln!("  Q{number} incorrect, answer is {expected}")
                }
                Verdict::Ungraded => eprintln!("  Q{number} recorded (no key entry)"),
            },
            SessionEvent::MarkedForReview { number, marked } => {
                let state = if *marked { "marked" } else { "unmarked" };
                eprintln!("  Q{number} {state} for review");
            }
            SessionEvent::FinishDeferred { .. } => eprintln!("  finishing..."),
            SessionEvent::Finished(summary) => eprintln!(
                "\nFinished ({:?}) after {}: {} solved, {} skipped",
                summary.reason,
                format_clock(summary.duration_secs),
                summary.solved_count,
                summary.skipped.len()
            ),
            SessionEvent::Cue { cue } => match cue {
                Cue::TimeWarning => eprintln!("\x07  Five minutes left!"),
                Cue::TimeUp => eprintln!("\x07  Time is up."),
                Cue::Correct | Cue::Incorrect | Cue::Neutral => {}
            },
        }
    }

    fn on_rejected(&self, _command: &SessionCommand, error: &SessionError) {
        eprintln!("  ! {error}");
    }
}

/// Logs the completion callbacks.
struct LoggingHooks;

impl SessionHooks for LoggingHooks {
    fn on_session_complete(&self, duration_secs: u64, solved_count: usize, skipped: &[u32]) {
        tracing::info!(duration_secs, solved_count, skipped = skipped.len(), "session complete");
    }

    fn on_log_result(&self, result: &ExamResult) {
        tracing::info!(score = %result.score, syllabus = %result.syllabus, "result logged");
    }

    fn on_save_task(&self, task: &StudyTask) {
        tracing::info!(title = %task.title, date = %task.date, "re-attempt task");
    }
}

/// One parsed line of user input.
#[derive(Debug, PartialEq, Eq)]
enum Input {
    Command(SessionCommand),
    Help,
    Empty,
}

const HELP: &str = "Commands:
  a <answer>      answer the current question (A-D, a number, or A,C for multi-choice)
  t <option>      toggle one option of a multi-choice answer
  c               clear the current answer
  n / p           next / previous question
  j <position>    jump to a question by position (1-based)
  m               mark or unmark for review
  s               submit";

fn parse_input(line: &str) -> Result<Input, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(Input::Empty);
    }
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let command = match verb.to_lowercase().as_str() {
        "help" | "h" | "?" => return Ok(Input::Help),
        "a" | "answer" => {
            if rest.is_empty() {
                return Err("answer what? e.g. `a B`".into());
            }
            let answer = if rest.contains(',') {
                Answer::multi(rest.split(',').map(str::trim).filter(|s| !s.is_empty()))
            } else {
                Answer::single(rest)
            };
            SessionCommand::Answer { answer }
        }
        "t" | "toggle" if !rest.is_empty() => SessionCommand::ToggleOption {
            option: rest.to_string(),
        },
        "c" | "clear" => SessionCommand::ClearAnswer,
        "n" | "next" => SessionCommand::Next,
        "p" | "prev" | "previous" => SessionCommand::Previous,
        "j" | "jump" => {
            let position: usize = rest
                .parse()
                .map_err(|_| format!("not a question position: '{rest}'"))?;
            if position == 0 {
                return Err("positions start at 1".into());
            }
            SessionCommand::JumpTo {
                index: position - 1,
            }
        }
        "m" | "mark" => SessionCommand::MarkForReview,
        "s" | "submit" => SessionCommand::Submit,
        _ => return Err(format!("unknown command '{line}', type `help`")),
    };
    Ok(Input::Command(command))
}

/// `h:mm:ss`, or `m:ss` under an hour.
fn format_clock(secs: u64) -> String {
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

/// Read stdin on a plain thread and forward commands. EOF closes the channel.
fn spawn_stdin_reader(tx: mpsc::Sender<String>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.blocking_send(line).is_err() {
                break;
            }
        }
    });
}

fn dispatch(commands: &mpsc::Sender<SessionCommand>, line: &str) {
    match parse_input(line) {
        Ok(Input::Command(command)) => {
            if let Err(e) = commands.try_send(command) {
                tracing::warn!("command dropped: {e}");
            }
        }
        Ok(Input::Help) => eprintln!("{HELP}"),
        Ok(Input::Empty) => {}
        Err(message) => eprintln!("  ! {message}"),
    }
}

/// Feed stdin lines to the session until it ends. Stdin EOF closes the
/// command channel. Lines read after the session ends stay in `lines`.
async fn drive_session(
    runner: &SessionRunner,
    session: ExamSession,
    lines: &mut mpsc::Receiver<String>,
) -> Result<SessionOutcome, SessionError> {
    let (tx, rx) = mpsc::channel(32);
    let run = runner.run(session, rx);
    tokio::pin!(run);
    let mut commands = Some(tx);

    loop {
        tokio::select! {
            biased;
            outcome = &mut run => return outcome,
            line = lines.recv(), if commands.is_some() => match line {
                Some(line) => {
                    if let Some(tx) = &commands {
                        dispatch(tx, &line);
                    }
                }
                None => commands = None,
            },
        }
    }
}

/// Ask on stderr, answer on stdin. EOF counts as no.
async fn confirm(lines: &mut mpsc::Receiver<String>, question: &str) -> bool {
    eprintln!("{question} [y/N]");
    lines
        .recv()
        .await
        .is_some_and(|answer| matches!(answer.trim(), "y" | "Y" | "yes"))
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let config = load_config_from(args.config.as_deref())?;
    let paper = load_paper(&args.paper, args.key.as_deref(), args.mode.as_deref())?;
    let questions = paper.resolved_questions();
    anyhow::ensure!(!questions.is_empty(), "paper '{}' has no questions", paper.id);

    let mut session_config =
        SessionConfig::for_paper(&paper).with_nav_debounce(config.session.nav_debounce());
    match (paper.mode, args.per_question_secs) {
        (PracticeMode::Custom, Some(per_question_secs)) => {
            anyhow::ensure!(per_question_secs > 0, "--per-question-secs must be positive");
            session_config =
                session_config.with_clock(ClockRegime::PerQuestion { per_question_secs });
        }
        (PracticeMode::Mock, Some(_)) => {
            anyhow::bail!("--per-question-secs only applies to custom papers")
        }
        (PracticeMode::Mock, None) if paper.duration_secs.is_none() => {
            session_config = session_config.with_clock(ClockRegime::Fixed {
                total_secs: config.session.mock_duration_secs,
            });
        }
        _ => {}
    }

    let has_key = session_config.answer_key.is_some();
    let external = match (&args.key_image, has_key) {
        (Some(path), false) => Some((
            read_key_image(path)?,
            build_adapter(&config, args.provider.as_deref(), args.model.clone())?,
        )),
        (Some(_), true) => {
            tracing::warn!("paper has an answer key, ignoring --key-image");
            None
        }
        (None, _) => None,
    };

    eprintln!("examdrill: {} ({} mode)", paper.name, paper.mode);

    let hooks: Arc<dyn SessionHooks> = Arc::new(LoggingHooks);
    let observer = Arc::new(ConsoleObserver {
        questions: questions.clone(),
    });
    let runner = SessionRunner::new(hooks.clone(), observer, EngineConfig::default());
    let session = ExamSession::new(session_config, questions.clone());

    let (line_tx, mut lines) = mpsc::channel(32);
    spawn_stdin_reader(line_tx);

    let mut outcome = drive_session(&runner, session, &mut lines).await?;

    match &mut outcome {
        SessionOutcome::Abandoned { session_id } => {
            eprintln!("Session {session_id} abandoned, nothing saved.");
            return Ok(());
        }
        SessionOutcome::Graded {
            record,
            outcome: grades,
            result,
            tasks,
        } => {
            if let Some(key) = &paper.answer_key {
                println!("{}", grade_table(&questions, &record.answers, key, grades));
            }
            println!("Score: {}", result.score);
            if !result.mistakes.is_empty() {
                println!("Mistakes: {}", result.mistakes.join(", "));
            }
            for task in tasks.iter() {
                println!("Task due {}: {}", task.date, task.title);
            }
        }
        SessionOutcome::AwaitingGrading { pending, .. } => match external {
            Some((key_image, adapter)) => loop {
                eprintln!("Grading with {} ...", adapter.grader_name());
                match pending
                    .grade_externally(&adapter, key_image.clone(), hooks.as_ref())
                    .await
                {
                    Resolution::Graded(result) => {
                        println!("Score: {}", result.score);
                        if let Some(analysis) = &result.analysis {
                            for suggestion in &analysis.ai_suggestions {
                                println!("  - {suggestion}");
                            }
                        }
                        break;
                    }
                    Resolution::Failed(failure) => {
                        eprintln!("Grading failed: {failure}");
                        if failure.retryable && confirm(&mut lines, "Retry grading?").await {
                            continue;
                        }
                        pending.abandon();
                        if failure.retryable {
                            eprintln!("Retry later with `examdrill grade-image` on the saved report.");
                        }
                        break;
                    }
                    Resolution::Stale => break,
                }
            },
            None => println!(
                "Score: awaiting grading (no answer key). Grade later with `examdrill grade` or `examdrill grade-image`."
            ),
        },
    }

    let report = outcome
        .to_report()
        .context("finished session produced no report")?;
    let output = args.output.unwrap_or(config.output_dir);
    let path = output.join(report.file_name());
    report.save_json(&path)?;
    eprintln!("Report saved to: {}", path.display());

    Ok(())
}
