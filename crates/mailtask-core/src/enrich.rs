//! Image enrichment: recognized text for materialized image attachments.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::node::is_image_type;

#[allow(clippy::expect_used)]
static LINE_BREAKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\r\n]+").expect("valid line break pattern"));

#[allow(clippy::expect_used)]
static SPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" +").expect("valid space pattern"));

/// Derives text from an image file.
pub trait Recognizer: Send + Sync {
    /// Returns the text found in the image at `path`, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EnrichmentFailed`] if the service cannot process the file.
    fn recognize(&self, path: &Path) -> Result<Option<String>>;
}

/// Collapses line break runs and space runs, then trims.
#[must_use]
pub fn normalize_recognized(raw: &str) -> String {
    let text = LINE_BREAKS.replace_all(raw, "\n");
    let text = SPACE_RUNS.replace_all(&text, " ");
    text.trim().to_string()
}

/// Runs the `tesseract` command line tool.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    program: PathBuf,
    languages: Option<String>,
}

impl TesseractRecognizer {
    /// Uses `tesseract` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_program("tesseract")
    }

    /// Uses a specific tesseract executable.
    #[must_use]
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            languages: None,
        }
    }

    /// Sets the recognition languages, e.g. `eng+deu`.
    #[must_use]
    pub fn languages(mut self, languages: impl Into<String>) -> Self {
        self.languages = Some(languages.into());
        self
    }
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Recognizer for TesseractRecognizer {
    fn recognize(&self, path: &Path) -> Result<Option<String>> {
        let mut command = Command::new(&self.program);
        command.arg(path).arg("stdout");
        if let Some(languages) = &self.languages {
            command.arg("-l").arg(languages);
        }
        command.arg("quiet");

        let output = command.output().map_err(|e| {
            Error::EnrichmentFailed(format!("failed to run {}: {e}", self.program.display()))
        })?;

        if !output.status.success() {
            return Err(Error::EnrichmentFailed(format!(
                "{} exited with {}: {}",
                self.program.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let text = normalize_recognized(&String::from_utf8_lossy(&output.stdout));
        Ok((!text.is_empty()).then_some(text))
    }
}

/// Scores how much a line of recognized text looks like real words.
pub trait LineScorer: Send + Sync {
    /// Returns the proportion (0.0 - 1.0) of words in `line` that are numbers
    /// or correctly spelled words longer than two characters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EnrichmentFailed`] if the spell checker fails.
    fn score(&self, line: &str) -> Result<f64>;
}

/// Scores lines with `ispell -a` (pipe mode).
#[derive(Debug, Clone)]
pub struct IspellScorer {
    program: PathBuf,
}

impl IspellScorer {
    /// Uses `ispell` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("ispell"),
        }
    }

    /// Uses a specific ispell-compatible executable (`aspell`, `hunspell`).
    #[must_use]
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn check_words(&self, words: &[&str]) -> Result<usize> {
        if words.is_empty() {
            return Ok(0);
        }

        let fail = |e: std::io::Error| {
            Error::EnrichmentFailed(format!("failed to run {}: {e}", self.program.display()))
        };

        let mut child = Command::new(&self.program)
            .arg("-a")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(fail)?;

        if let Some(mut stdin) = child.stdin.take() {
            // `^` keeps words from being read as pipe-mode commands
            let input: String = words.iter().map(|w| format!("^{w}\n")).collect();
            stdin.write_all(input.as_bytes()).map_err(fail)?;
        }

        let output = child.wait_with_output().map_err(fail)?;
        Ok(count_accepted(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl Default for IspellScorer {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts `*` (correct), `+` (root found) and `-` (compound) verdicts in
/// ispell pipe-mode output, skipping the version banner.
fn count_accepted(output: &str) -> usize {
    output
        .lines()
        .skip(1)
        .filter(|line| matches!(line.chars().next(), Some('*' | '+' | '-')))
        .count()
}

impl LineScorer for IspellScorer {
    fn score(&self, line: &str) -> Result<f64> {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            return Ok(0.0);
        }

        let numbers = words.iter().filter(|w| w.parse::<i64>().is_ok()).count();
        let candidates: Vec<&str> = words
            .iter()
            .copied()
            .filter(|w| w.parse::<i64>().is_err() && w.chars().count() > 2)
            .collect();
        let correct = numbers + self.check_words(&candidates)?;

        #[allow(clippy::cast_precision_loss)]
        Ok(correct as f64 / words.len() as f64)
    }
}

struct LineFilter {
    scorer: Box<dyn LineScorer>,
    min_score: f64,
}

/// Optional enrichment step for image leaves.
///
/// Without a recognizer this is a no-op.
#[derive(Default)]
pub struct Enricher {
    recognizer: Option<Box<dyn Recognizer>>,
    line_filter: Option<LineFilter>,
}

impl std::fmt::Debug for Enricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enricher")
            .field("enabled", &self.is_enabled())
            .field("min_line_score", &self.line_filter.as_ref().map(|l| l.min_score))
            .finish()
    }
}

impl Enricher {
    /// Creates a disabled enricher.
    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Creates an enricher backed by `recognizer`.
    #[must_use]
    pub fn new(recognizer: impl Recognizer + 'static) -> Self {
        Self::disabled().with_recognizer(recognizer)
    }

    /// Sets or replaces the recognizer, keeping any line filter.
    #[must_use]
    pub fn with_recognizer(mut self, recognizer: impl Recognizer + 'static) -> Self {
        self.recognizer = Some(Box::new(recognizer));
        self
    }

    /// Drops recognized lines scoring below `min_score`.
    ///
    /// The filter is inert until a recognizer is set.
    #[must_use]
    pub fn with_line_filter(mut self, scorer: impl LineScorer + 'static, min_score: f64) -> Self {
        self.line_filter = Some(LineFilter {
            scorer: Box::new(scorer),
            min_score,
        });
        self
    }

    /// Checks whether a recognizer is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.recognizer.is_some()
    }

    /// Returns recognized text for an image file.
    ///
    /// Non-image content types, a disabled enricher and empty results yield
    /// `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EnrichmentFailed`] if the recognizer fails.
    pub fn try_enrich(&self, path: &Path, content_type: &str) -> Result<Option<String>> {
        let Some(recognizer) = &self.recognizer else {
            return Ok(None);
        };
        if !is_image_type(content_type) {
            return Ok(None);
        }

        let Some(text) = recognizer.recognize(path)? else {
            return Ok(None);
        };
        let text = self.filter_lines(&text);
        Ok((!text.is_empty()).then_some(text))
    }

    /// Like [`Enricher::try_enrich`], but failures are logged and yield `None`.
    #[must_use]
    pub fn enrich(&self, path: &Path, content_type: &str) -> Option<String> {
        match self.try_enrich(path, content_type) {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Image enrichment failed");
                None
            }
        }
    }

    fn filter_lines(&self, text: &str) -> String {
        let Some(filter) = &self.line_filter else {
            return text.to_string();
        };

        let mut kept = Vec::new();
        for line in text.lines() {
            match filter.scorer.score(line) {
                Ok(score) if score >= filter.min_score => kept.push(line),
                Ok(score) => debug!(score, line, "Dropping low-scoring recognized line"),
                Err(e) => {
                    warn!(error = %e, "Line scoring failed, keeping recognized text unfiltered");
                    return text.to_string();
                }
            }
        }
        kept.join("\n")
    }
}

/// Formats the annotated block appended after an image's location.
#[must_use]
pub fn enrichment_block(filename: &str, text: &str) -> String {
    format!("\n\n[Text recognized in {filename}]\n{text}\n\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    struct Fixed(Option<&'static str>);

    impl Recognizer for Fixed {
        fn recognize(&self, _path: &Path) -> Result<Option<String>> {
            Ok(self.0.map(ToString::to_string))
        }
    }

    struct Broken;

    impl Recognizer for Broken {
        fn recognize(&self, _path: &Path) -> Result<Option<String>> {
            Err(Error::EnrichmentFailed("service down".into()))
        }
    }

    /// Scores a line by the share of words that are all-lowercase letters.
    struct Lowercase;

    impl LineScorer for Lowercase {
        fn score(&self, line: &str) -> Result<f64> {
            let words: Vec<_> = line.split_whitespace().collect();
            let good = words
                .iter()
                .filter(|w| w.chars().all(|c| c.is_ascii_lowercase()))
                .count();
            #[allow(clippy::cast_precision_loss)]
            Ok(good as f64 / words.len().max(1) as f64)
        }
    }

    #[test]
    fn test_normalize_recognized() {
        assert_eq!(
            normalize_recognized("  Hello   world\r\n\r\n\nsecond    line \n\n"),
            "Hello world\nsecond line"
        );
        assert_eq!(normalize_recognized(" \n \n"), "");
    }

    #[test]
    fn test_disabled_is_noop() {
        let enricher = Enricher::disabled();
        assert!(!enricher.is_enabled());
        assert_eq!(enricher.try_enrich(Path::new("/x.png"), "image/png").unwrap(), None);
    }

    #[test]
    fn test_only_images_are_recognized() {
        let enricher = Enricher::new(Fixed(Some("text")));
        assert_eq!(enricher.enrich(Path::new("/x.pdf"), "application/pdf"), None);
        assert_eq!(
            enricher.enrich(Path::new("/x.jpg"), "IMAGE/JPEG").as_deref(),
            Some("text")
        );
        assert_eq!(
            enricher.enrich(Path::new("/x.png"), "image/png").as_deref(),
            Some("text")
        );
    }

    #[test]
    fn test_failure_is_swallowed() {
        let enricher = Enricher::new(Broken);
        assert!(enricher.try_enrich(Path::new("/x.png"), "image/png").is_err());
        assert_eq!(enricher.enrich(Path::new("/x.png"), "image/png"), None);
    }

    #[test]
    fn test_line_filter() {
        let enricher = Enricher::new(Fixed(Some("real words here\nX7$ q|| ~~\nmostly fine Text")))
            .with_line_filter(Lowercase, 0.6);
        assert_eq!(
            enricher.enrich(Path::new("/x.png"), "image/png").as_deref(),
            Some("real words here\nmostly fine Text")
        );
    }

    #[test]
    fn test_filter_dropping_everything_yields_none() {
        let enricher = Enricher::new(Fixed(Some("### ???"))).with_line_filter(Lowercase, 0.5);
        assert_eq!(enricher.enrich(Path::new("/x.png"), "image/png"), None);
    }

    #[test]
    fn test_count_accepted() {
        let output = "@(#) International Ispell Version 3.4.05\n*\n\n& helo 3 0: hello, halo, help\n\n+ RUN\n\n-\n\n# qzx 0\n\n";
        assert_eq!(count_accepted(output), 3);
    }

    #[test]
    fn test_missing_tesseract_is_enrichment_failure() {
        let recognizer = TesseractRecognizer::with_program("/nonexistent/tesseract-binary");
        let err = recognizer.recognize(Path::new("/x.png")).unwrap_err();
        assert!(matches!(err, Error::EnrichmentFailed(_)));
    }

    #[test]
    fn test_block_format() {
        assert_eq!(
            enrichment_block("scan.png", "TOTAL 42"),
            "\n\n[Text recognized in scan.png]\nTOTAL 42\n\n"
        );
    }
}
