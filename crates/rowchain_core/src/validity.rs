//! Validity checks for candidate chain files.
//!
//! A candidate is usable when, in this order:
//!
//! 1. it can be opened,
//! 2. it is not a zombie (header and directory verify),
//! 3. it is not flagged as recovered, if recovered files are rejected,
//! 4. it holds the named logical container,
//! 5. that container has at least one record.
//!
//! The file is opened once and dropped before returning; nothing is kept.

use crate::file::ContainerFile;
use rowchain_storage::FileBackend;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// The first condition a candidate file failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Invalidity {
    /// The file could not be opened.
    #[error("cannot be opened: {0}")]
    CannotOpen(String),

    /// The file is corrupt.
    #[error("is a zombie: {0}")]
    Zombie(String),

    /// The file was recovered after an interrupted write.
    #[error("is a recovered file")]
    Recovered,

    /// The file has no container with the requested name.
    #[error("has no container '{0}'")]
    MissingContainer(String),

    /// The container exists but holds no records.
    #[error("container '{0}' has no entries")]
    Empty(String),
}

/// Checks a candidate file and reports the first failing condition.
///
/// # Errors
///
/// Returns the [`Invalidity`] describing why the file is not usable.
pub fn check_validity(
    path: &Path,
    container: &str,
    reject_recovered: bool,
) -> Result<(), Invalidity> {
    let backend = FileBackend::open(path).map_err(|e| Invalidity::CannotOpen(e.to_string()))?;
    let file = ContainerFile::open(backend).map_err(|e| Invalidity::Zombie(e.to_string()))?;

    if reject_recovered && file.is_recovered() {
        return Err(Invalidity::Recovered);
    }

    match file.container(container) {
        None => Err(Invalidity::MissingContainer(container.to_string())),
        Some(entry) if entry.is_empty() => Err(Invalidity::Empty(container.to_string())),
        Some(_) => Ok(()),
    }
}

/// Returns whether a candidate file is usable.
///
/// The reason for a rejection is logged at warn level when `verbose` is
/// set, and at debug level otherwise.
#[must_use]
pub fn is_valid(path: &Path, container: &str, reject_recovered: bool, verbose: bool) -> bool {
    match check_validity(path, container, reject_recovered) {
        Ok(()) => true,
        Err(reason) => {
            if verbose {
                warn!(path = %path.display(), %reason, "file is not valid");
            } else {
                debug!(path = %path.display(), %reason, "file is not valid");
            }
            false
        }
    }
}
