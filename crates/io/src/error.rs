use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum IoError {
    /// File could not be opened (missing, permissions, not a workbook).
    Open { path: PathBuf, message: String },
    /// File opened but its contents could not be read.
    Read { path: PathBuf, message: String },
    /// Requested worksheet is absent, or the workbook has none.
    Sheet { path: PathBuf, message: String },
    /// Malformed CSV record.
    Csv { path: PathBuf, message: String },
    /// Building or serializing an output failed.
    Write { path: PathBuf, message: String },
    /// The finished temp file could not be moved into place.
    Persist { path: PathBuf, message: String },
}

impl IoError {
    pub(crate) fn open(path: &Path, e: impl fmt::Display) -> Self {
        Self::Open { path: path.to_path_buf(), message: e.to_string() }
    }

    pub(crate) fn read(path: &Path, e: impl fmt::Display) -> Self {
        Self::Read { path: path.to_path_buf(), message: e.to_string() }
    }

    pub(crate) fn sheet(path: &Path, message: impl Into<String>) -> Self {
        Self::Sheet { path: path.to_path_buf(), message: message.into() }
    }

    pub(crate) fn csv(path: &Path, e: impl fmt::Display) -> Self {
        Self::Csv { path: path.to_path_buf(), message: e.to_string() }
    }

    pub(crate) fn write(path: &Path, e: impl fmt::Display) -> Self {
        Self::Write { path: path.to_path_buf(), message: e.to_string() }
    }

    pub(crate) fn persist(path: &Path, e: impl fmt::Display) -> Self {
        Self::Persist { path: path.to_path_buf(), message: e.to_string() }
    }

    /// True for failures while loading inputs, false for output failures.
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            Self::Open { .. } | Self::Read { .. } | Self::Sheet { .. } | Self::Csv { .. }
        )
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open { path, message } => write!(f, "cannot open {}: {message}", path.display()),
            Self::Read { path, message } => write!(f, "cannot read {}: {message}", path.display()),
            Self::Sheet { path, message } => write!(f, "{}: {message}", path.display()),
            Self::Csv { path, message } => write!(f, "{}: malformed CSV: {message}", path.display()),
            Self::Write { path, message } => {
                write!(f, "cannot write {}: {message}", path.display())
            }
            Self::Persist { path, message } => {
                write!(f, "cannot move output into place at {}: {message}", path.display())
            }
        }
    }
}

impl std::error::Error for IoError {}
