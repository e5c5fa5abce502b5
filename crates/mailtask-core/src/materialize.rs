//! Attachment materialization: collision-safe persistence of binary leaves.

use std::fs::{DirBuilder, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::node::BinaryLeaf;

/// A binary leaf persisted to storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaterializedAttachment {
    /// Absolute path of the written file.
    pub path: PathBuf,
    /// Public location of the file.
    pub location: String,
    /// Content identifier of the originating leaf.
    pub content_id: Option<String>,
}

/// Preferred extensions for common types, ahead of `mime_guess` ordering.
const PREFERRED_EXTENSIONS: &[(&str, &str)] = &[
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/webp", "webp"),
    ("image/heic", "heic"),
    ("image/tiff", "tiff"),
    ("image/svg+xml", "svg"),
    ("text/plain", "txt"),
    ("text/html", "html"),
    ("text/calendar", "ics"),
    ("application/pdf", "pdf"),
    ("application/zip", "zip"),
    ("message/rfc822", "eml"),
];

/// Infers a file extension (without the dot) from a content type tag.
#[must_use]
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let tag = content_type.trim().to_lowercase();
    PREFERRED_EXTENSIONS
        .iter()
        .find(|(t, _)| *t == tag)
        .map(|(_, ext)| *ext)
        .or_else(|| mime_guess::get_mime_extensions_str(&tag)?.first().copied())
}

/// Makes a name safe to use as a single path component.
///
/// Separators, NUL and control characters become `_`, leading dots are
/// removed and surrounding whitespace is trimmed. May return an empty string.
#[must_use]
pub fn sanitize_component(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    replaced.trim().trim_start_matches('.').trim().to_string()
}

/// Inserts ` (n)` before the extension: `scan.png` becomes `scan (1).png`.
fn with_suffix(filename: &str, n: u64) -> String {
    match filename.rfind('.') {
        Some(dot) if dot > 0 => format!("{} ({n}){}", &filename[..dot], &filename[dot..]),
        _ => format!("{filename} ({n})"),
    }
}

/// Persists binary leaves under per-message directories.
#[derive(Debug, Clone, Copy)]
pub struct Materializer<'a> {
    config: &'a PipelineConfig,
}

impl<'a> Materializer<'a> {
    /// Creates a materializer for the given configuration.
    #[must_use]
    pub const fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Writes `leaf` into the message's directory without overwriting
    /// anything, and returns where it landed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unusable message id and
    /// [`Error::MaterializationFailed`] if the directory cannot be created
    /// or the write fails for a reason other than a name collision.
    pub fn materialize(&self, message_id: &str, leaf: &BinaryLeaf) -> Result<MaterializedAttachment> {
        let message_key = sanitize_component(message_id);
        if message_key.is_empty() {
            return Err(Error::Config(format!(
                "message id {message_id:?} cannot name a directory"
            )));
        }

        let dir = self.config.message_dir(&message_key);
        self.create_dir(&dir)?;

        let filename = leaf
            .filename
            .as_deref()
            .map(sanitize_component)
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| synthesize_filename(&message_key, &leaf.content_type));

        let (path, written_name) = self.write_exclusive(&dir, &filename, &leaf.bytes)?;
        let location = self.config.location_for(&message_key, &written_name)?;

        debug!(
            message_id,
            path = %path.display(),
            content_type = %leaf.content_type,
            "Materialized attachment"
        );

        Ok(MaterializedAttachment {
            path,
            location,
            content_id: leaf.content_id.clone(),
        })
    }

    fn create_dir(&self, dir: &Path) -> Result<()> {
        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(self.config.dir_mode);
        }
        builder
            .create(dir)
            .map_err(|source| Error::MaterializationFailed {
                path: dir.to_path_buf(),
                source,
            })
    }

    fn create_new(&self, path: &Path) -> std::io::Result<File> {
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(self.config.file_mode);
        }
        options.open(path)
    }

    /// Tries `name`, then `name (1)`, `name (2)`, … until exclusive creation
    /// succeeds.
    fn write_exclusive(&self, dir: &Path, filename: &str, bytes: &[u8]) -> Result<(PathBuf, String)> {
        let mut attempt = 0u64;
        loop {
            let candidate = if attempt == 0 {
                filename.to_string()
            } else {
                with_suffix(filename, attempt)
            };
            let path = dir.join(&candidate);

            let mut file = match self.create_new(&path) {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!(attempt, path = %path.display(), "Attachment name taken");
                    attempt += 1;
                    continue;
                }
                Err(source) => return Err(Error::MaterializationFailed { path, source }),
            };

            if let Err(source) = file.write_all(bytes).and_then(|()| file.sync_all()) {
                drop(file);
                // The partial file is ours; nothing else can have opened it yet.
                let _ = std::fs::remove_file(&path);
                return Err(Error::MaterializationFailed { path, source });
            }

            return Ok((path, candidate));
        }
    }
}

fn synthesize_filename(message_key: &str, content_type: &str) -> String {
    extension_for(content_type).map_or_else(
        || message_key.to_string(),
        |ext| format!("{message_key}.{ext}"),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> PipelineConfig {
        PipelineConfig::new(dir.path(), "https://files.example.com/att").unwrap()
    }

    #[test]
    fn test_declared_filename() {
        let tmp = TempDir::new().unwrap();
        let config = config(&tmp);
        let leaf = BinaryLeaf::new("application/pdf", b"%PDF".to_vec())
            .with_filename("report.pdf")
            .with_content_id("r1");

        let written = Materializer::new(&config).materialize("m1", &leaf).unwrap();

        assert_eq!(written.path, tmp.path().join("m1").join("report.pdf"));
        assert_eq!(written.location, "https://files.example.com/att/m1/report.pdf");
        assert_eq!(written.content_id.as_deref(), Some("r1"));
        assert_eq!(std::fs::read(&written.path).unwrap(), b"%PDF");
    }

    #[test]
    fn test_collision_gets_suffix() {
        let tmp = TempDir::new().unwrap();
        let config = config(&tmp);
        let materializer = Materializer::new(&config);
        let first = BinaryLeaf::new("image/png", b"one".to_vec()).with_filename("scan.png");
        let second = BinaryLeaf::new("image/png", b"two".to_vec()).with_filename("scan.png");
        let third = BinaryLeaf::new("image/png", b"three".to_vec()).with_filename("scan.png");

        let a = materializer.materialize("m", &first).unwrap();
        let b = materializer.materialize("m", &second).unwrap();
        let c = materializer.materialize("m", &third).unwrap();

        assert_eq!(a.path.file_name().unwrap(), "scan.png");
        assert_eq!(b.path.file_name().unwrap(), "scan (1).png");
        assert_eq!(c.path.file_name().unwrap(), "scan (2).png");
        assert_eq!(b.location, "https://files.example.com/att/m/scan%20(1).png");
        assert_eq!(std::fs::read(&a.path).unwrap(), b"one");
        assert_eq!(std::fs::read(&b.path).unwrap(), b"two");
    }

    #[test]
    fn test_existing_file_never_overwritten() {
        let tmp = TempDir::new().unwrap();
        let config = config(&tmp);
        std::fs::create_dir_all(tmp.path().join("m")).unwrap();
        std::fs::write(tmp.path().join("m").join("notes"), b"keep").unwrap();

        let leaf = BinaryLeaf::new("application/x-unknown-thing", b"new".to_vec()).with_filename("notes");
        let written = Materializer::new(&config).materialize("m", &leaf).unwrap();

        assert_eq!(written.path.file_name().unwrap(), "notes (1)");
        assert_eq!(std::fs::read(tmp.path().join("m").join("notes")).unwrap(), b"keep");
    }

    #[test]
    fn test_synthesized_filename() {
        let tmp = TempDir::new().unwrap();
        let config = config(&tmp);
        let materializer = Materializer::new(&config);

        let jpeg = materializer
            .materialize("msg42", &BinaryLeaf::new("image/jpeg", b"x".to_vec()))
            .unwrap();
        assert_eq!(jpeg.path.file_name().unwrap(), "msg42.jpg");

        let unknown = materializer
            .materialize("msg42", &BinaryLeaf::new("application/x-made-up", b"x".to_vec()))
            .unwrap();
        assert_eq!(unknown.path.file_name().unwrap(), "msg42");
    }

    #[test]
    fn test_hostile_filename_stays_in_message_dir() {
        let tmp = TempDir::new().unwrap();
        let config = config(&tmp);
        let leaf = BinaryLeaf::new("text/plain", b"x".to_vec()).with_filename("../../etc/passwd");
        let written = Materializer::new(&config).materialize("m", &leaf).unwrap();
        assert_eq!(written.path.parent().unwrap(), tmp.path().join("m"));
    }

    #[test]
    fn test_empty_message_id_rejected() {
        let tmp = TempDir::new().unwrap();
        let config = config(&tmp);
        let leaf = BinaryLeaf::new("text/plain", b"x".to_vec());
        assert!(matches!(
            Materializer::new(&config).materialize("..", &leaf),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_unwritable_base_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"not a dir").unwrap();
        let config = PipelineConfig::new(&blocker, "https://x.test").unwrap();
        let err = Materializer::new(&config)
            .materialize("m", &BinaryLeaf::new("image/png", b"x".to_vec()))
            .unwrap_err();
        assert!(matches!(err, Error::MaterializationFailed { .. }));
        assert!(err.is_message_fatal());
    }

    #[cfg(unix)]
    #[test]
    fn test_permission_bits() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        let config = config(&tmp).with_file_mode(0o600).with_dir_mode(0o700);
        let written = Materializer::new(&config)
            .materialize("m", &BinaryLeaf::new("image/png", b"x".to_vec()))
            .unwrap();
        let file_mode = std::fs::metadata(&written.path).unwrap().permissions().mode();
        let dir_mode = std::fs::metadata(tmp.path().join("m")).unwrap().permissions().mode();
        assert_eq!(file_mode & 0o777, 0o600);
        assert_eq!(dir_mode & 0o777, 0o700);
    }

    #[test]
    fn test_with_suffix() {
        assert_eq!(with_suffix("a.tar.gz", 3), "a.tar (3).gz");
        assert_eq!(with_suffix("README", 1), "README (1)");
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for("IMAGE/PNG"), Some("png"));
        assert!(extension_for("application/msword").is_some());
        assert_eq!(extension_for("application/x-made-up"), None);
    }
}
