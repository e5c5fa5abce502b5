//! `mailtask` - turns email sent to a task inbox into task documents.
//!
//! Reads unread mail addressed to the incoming address from a Maildir,
//! writes attachments under a published directory, and sends one plain
//! text message per task to the outgoing address.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod settings;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use mailtask_core::{
    IspellScorer, Maildir, MailSource, Outbox, Pipeline, PipelineConfig, RunSummary, Runner,
    SendmailOutbox, SpoolOutbox, TesseractRecognizer, parse_mode,
};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use settings::{FileSettings, required};

/// Exit code when some messages could not be processed.
const PARTIAL_FAILURE: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "mailtask", version, about = "Turn task email into task documents with linked attachments")]
struct Args {
    /// Maildir holding incoming mail.
    #[arg(long, env = "MAILTO_THINGS_MAILDIR")]
    maildir: Option<PathBuf>,

    /// Directory where attachments are stored, one subdirectory per message.
    #[arg(long, env = "MAILTO_THINGS_ATTACHMENTS_DIR")]
    attachments_dir: Option<PathBuf>,

    /// Public URL of the attachments directory.
    #[arg(long, env = "MAILTO_THINGS_ATTACHMENTS_DIR_URL")]
    attachments_dir_url: Option<String>,

    /// Address which receives tasks.
    #[arg(long, env = "MAILTO_THINGS_INCOMING_EMAIL")]
    incoming_email: Option<String>,

    /// Address task documents are sent to.
    #[arg(long, env = "MAILTO_THINGS_OUTGOING_EMAIL")]
    outgoing_email: Option<String>,

    /// Octal mode for attachment files, `0` or `0o` prefixed [default: 0600].
    #[arg(long, value_name = "MODE")]
    file_create_mode: Option<String>,

    /// Octal mode for attachment directories [default: 0700].
    #[arg(long, value_name = "MODE")]
    dir_create_mode: Option<String>,

    /// Append text recognized in image attachments.
    #[arg(long, env = "MAILTO_THINGS_OCR")]
    ocr: bool,

    /// Tesseract executable.
    #[arg(long, value_name = "PATH")]
    tesseract: Option<PathBuf>,

    /// Tesseract languages, e.g. `eng+deu`.
    #[arg(long, value_name = "LANGS")]
    ocr_languages: Option<String>,

    /// Drop recognized lines whose spell-check score is below this (0.0-1.0).
    #[arg(long, value_name = "SCORE")]
    ocr_min_line_score: Option<f64>,

    /// Ispell-compatible executable for line scoring.
    #[arg(long, value_name = "PATH")]
    ispell: Option<PathBuf>,

    /// Write outgoing messages to this directory instead of sending them.
    #[arg(long, value_name = "DIR")]
    spool_dir: Option<PathBuf>,

    /// Sendmail executable.
    #[arg(long, value_name = "PATH")]
    sendmail: Option<PathBuf>,

    /// Mark handled messages read instead of moving them to the trash.
    #[arg(long)]
    keep: bool,

    /// JSON settings file [default: <config dir>/mailtask/config.json].
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print the run summary as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Log debug output.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(&args) {
        Ok(summary) if summary.is_success() => ExitCode::SUCCESS,
        Ok(summary) => {
            warn!(failed = summary.failed.len(), "Some messages were left for the next run");
            ExitCode::from(PARTIAL_FAILURE)
        }
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "mailtask=debug,mailtask_core=debug"
    } else {
        "mailtask=info,mailtask_core=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(args: &Args) -> Result<RunSummary> {
    let file = FileSettings::load(args.config.as_deref())?;

    let maildir = required(args.maildir.clone(), file.maildir.clone(), "maildir", "MAILTO_THINGS_MAILDIR")?;
    let incoming = required(
        args.incoming_email.clone(),
        file.incoming_email.clone(),
        "incoming-email",
        "MAILTO_THINGS_INCOMING_EMAIL",
    )?;
    let outgoing = required(
        args.outgoing_email.clone(),
        file.outgoing_email.clone(),
        "outgoing-email",
        "MAILTO_THINGS_OUTGOING_EMAIL",
    )?;

    let pipeline = build_pipeline(args, &file)?;
    let source = Maildir::new(&maildir, &incoming).keep_handled(args.keep || file.keep.unwrap_or(false));

    info!(maildir = %maildir.display(), incoming = %incoming, "Starting mailtask");

    let summary = match args.spool_dir.clone().or_else(|| file.spool_dir.clone()) {
        Some(dir) => execute(pipeline, source, SpoolOutbox::new(dir), &incoming, &outgoing)?,
        None => {
            let sendmail = args
                .sendmail
                .clone()
                .or_else(|| file.sendmail.clone())
                .map_or_else(SendmailOutbox::new, SendmailOutbox::with_program);
            execute(pipeline, source, sendmail, &incoming, &outgoing)?
        }
    };

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("failed to serialize run summary")?
        );
    }
    Ok(summary)
}

fn execute<S: MailSource, O: Outbox>(
    pipeline: Pipeline,
    source: S,
    outbox: O,
    from: &str,
    to: &str,
) -> Result<RunSummary> {
    Runner::new(pipeline, source, outbox, from, to)
        .run()
        .context("failed to fetch messages to process")
}

fn build_pipeline(args: &Args, file: &FileSettings) -> Result<Pipeline> {
    let attachments_dir = required(
        args.attachments_dir.clone(),
        file.attachments_dir.clone(),
        "attachments-dir",
        "MAILTO_THINGS_ATTACHMENTS_DIR",
    )?;
    let attachments_url = required(
        args.attachments_dir_url.clone(),
        file.attachments_dir_url.clone(),
        "attachments-dir-url",
        "MAILTO_THINGS_ATTACHMENTS_DIR_URL",
    )?;

    let mut config = PipelineConfig::new(attachments_dir, &attachments_url)?;
    if let Some(mode) = args.file_create_mode.as_ref().or(file.file_create_mode.as_ref()) {
        config = config.with_file_mode(parse_mode(mode).context("invalid --file-create-mode")?);
    }
    if let Some(mode) = args.dir_create_mode.as_ref().or(file.dir_create_mode.as_ref()) {
        config = config.with_dir_mode(parse_mode(mode).context("invalid --dir-create-mode")?);
    }

    let mut pipeline = Pipeline::new(config);
    if args.ocr || file.ocr.unwrap_or(false) {
        let mut recognizer = args
            .tesseract
            .clone()
            .or_else(|| file.tesseract.clone())
            .map_or_else(TesseractRecognizer::new, TesseractRecognizer::with_program);
        if let Some(languages) = args.ocr_languages.clone().or_else(|| file.ocr_languages.clone()) {
            recognizer = recognizer.languages(languages);
        }
        pipeline = pipeline.with_recognizer(recognizer);

        if let Some(min_score) = args.ocr_min_line_score.or(file.ocr_min_line_score) {
            anyhow::ensure!(
                (0.0..=1.0).contains(&min_score),
                "--ocr-min-line-score must be between 0.0 and 1.0"
            );
            let scorer = args
                .ispell
                .clone()
                .or_else(|| file.ispell.clone())
                .map_or_else(IspellScorer::new, IspellScorer::with_program);
            pipeline = pipeline.with_line_filter(scorer, min_score);
        }
    }

    Ok(pipeline)
}
