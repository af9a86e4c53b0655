//! Scoped on-disk copies of uploaded audio.
//!
//! Decoders work on paths, so uploads are spooled to a temp file that lives
//! exactly as long as the [`ScopedUpload`] guard. The file is removed when
//! the guard is dropped or explicitly closed, whichever comes first.

use std::io::Write;
use std::path::Path;

/// A temp file holding one upload.
#[derive(Debug)]
pub struct ScopedUpload {
    file: tempfile::NamedTempFile,
}

impl ScopedUpload {
    /// Spool `bytes` to a new temp file with the given extension (without dot).
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created or written.
    pub fn write(bytes: &[u8], extension: Option<&str>) -> std::io::Result<Self> {
        let suffix = extension
            .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let mut file = tempfile::Builder::new()
            .prefix("parkinsight-upload-")
            .suffix(&suffix)
            .tempfile()?;
        file.write_all(bytes)?;
        file.flush()?;
        tracing::debug!(path = %file.path().display(), bytes = bytes.len(), "Spooled upload");
        Ok(Self { file })
    }

    /// Path of the spooled file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Delete the file now, reporting any error instead of swallowing it.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if removal fails.
    pub fn close(self) -> std::io::Result<()> {
        let path = self.file.path().to_path_buf();
        self.file.close()?;
        tracing::debug!(path = %path.display(), "Removed spooled upload");
        Ok(())
    }
}

/// Extension of an uploaded file name, lowercased.
#[must_use]
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}
