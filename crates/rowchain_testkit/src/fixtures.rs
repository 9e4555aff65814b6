//! Test fixtures and file helpers.
//!
//! Provides sample record types, a temporary directory that writes chain
//! files into itself, and helpers that damage files on disk.

use rowchain_core::{Named, RecordWriter, WriterOptions};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A sample detector hit, the record type used across the tests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// Channel number.
    pub channel: u32,
    /// Deposited charge.
    pub charge: f64,
    /// Time stamp in nanoseconds.
    pub time_ns: u64,
    /// Free-form tag.
    pub tag: String,
}

impl Named for Hit {
    const NAME: &'static str = "Hit";
}

/// A sample auxiliary object stored next to the hits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Run number.
    pub run: u32,
    /// Number of hits written in the run.
    pub hits: u64,
}

impl Named for Summary {
    const NAME: &'static str = "Summary";
}

/// A record type stored under a different field than [`Hit`], for
/// binding mismatch tests.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Track identifier.
    pub id: u32,
}

impl Named for Track {
    const NAME: &'static str = "Track";
}

/// Returns a deterministic hit for `channel`.
#[must_use]
pub fn sample_hit(channel: u32) -> Hit {
    Hit {
        channel,
        charge: f64::from(channel) * 1.25,
        time_ns: u64::from(channel) * 40,
        tag: format!("ch{channel}"),
    }
}

/// Returns one sample hit per channel in `channels`.
#[must_use]
pub fn sample_hits(channels: std::ops::Range<u32>) -> Vec<Hit> {
    channels.map(sample_hit).collect()
}

/// A temporary directory for chain files, removed on drop.
pub struct TestDir {
    dir: TempDir,
}

impl Default for TestDir {
    fn default() -> Self {
        Self::new()
    }
}

impl TestDir {
    /// Creates a new temporary directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Returns the directory path.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Returns the path of `name` inside the directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Writes `hits` to a finished file called `name`.
    pub fn write_hits(&self, name: &str, hits: &[Hit]) -> PathBuf {
        self.write_hits_with(name, hits, &[])
    }

    /// Writes `hits` and the named summaries to a finished file.
    pub fn write_hits_with(&self, name: &str, hits: &[Hit], objects: &[(&str, Summary)]) -> PathBuf {
        let path = self.path(name);
        let mut writer = RecordWriter::<Hit>::open_with(&path, WriterOptions::new().buffer_size(4096))
            .expect("Failed to open writer");
        writer.fill_all(hits).expect("Failed to write hits");
        for (object_name, summary) in objects {
            writer
                .write_as(summary, object_name)
                .expect("Failed to write summary");
        }
        writer.close().expect("Failed to close writer");
        path
    }

    /// Writes records of another type to a finished file called `name`.
    pub fn write_tracks(&self, name: &str, count: u32) -> PathBuf {
        let path = self.path(name);
        let mut writer = RecordWriter::<Track>::open(&path).expect("Failed to open writer");
        for id in 0..count {
            writer.fill(&Track { id }).expect("Failed to write track");
        }
        writer.close().expect("Failed to close writer");
        path
    }

    /// Writes bytes that are not a container file.
    pub fn write_garbage(&self, name: &str) -> PathBuf {
        let path = self.path(name);
        fs::write(&path, b"this file was never a container file").expect("Failed to write file");
        path
    }
}

/// Flips every bit of the byte at `offset`.
pub fn corrupt_byte(path: &Path, offset: u64) {
    let mut data = fs::read(path).expect("Failed to read file");
    let index = usize::try_from(offset).expect("Offset out of range");
    data[index] ^= 0xFF;
    fs::write(path, data).expect("Failed to write file");
}

/// Flips the byte `from_end` bytes before the end of the file.
pub fn corrupt_from_end(path: &Path, from_end: u64) {
    let len = file_len(path);
    corrupt_byte(path, len - from_end);
}

/// Removes the last `bytes` bytes of a file.
pub fn truncate_by(path: &Path, bytes: u64) {
    let len = file_len(path);
    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .expect("Failed to open file");
    file.set_len(len.saturating_sub(bytes))
        .expect("Failed to truncate file");
}

/// Returns the size of a file.
pub fn file_len(path: &Path) -> u64 {
    fs::metadata(path).expect("Failed to stat file").len()
}

/// Installs a test log subscriber, filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs it.
pub fn init_test_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
