//! Cross-crate integration test helpers.
//!
//! Provides a harness that writes chain files, remembers what went into
//! each, and checks a reader against it.

use crate::fixtures::{Hit, Summary, TestDir};
use rowchain_core::{ChainReader, CoreResult, ReaderOptions};
use std::path::PathBuf;

/// A chain file the harness wrote.
#[derive(Debug, Clone)]
pub struct WrittenFile {
    /// Path of the file.
    pub path: PathBuf,
    /// Hits written to it, in order.
    pub hits: Vec<Hit>,
    /// Whether a reader should admit it under validity checking.
    pub valid: bool,
}

/// A test harness for chain integration testing.
pub struct ChainHarness {
    dir: TestDir,
    files: Vec<WrittenFile>,
}

impl ChainHarness {
    /// Creates a harness over a fresh temporary directory.
    pub fn new() -> Self {
        Self {
            dir: TestDir::new(),
            files: Vec::new(),
        }
    }

    /// Returns the temporary directory.
    pub fn dir(&self) -> &TestDir {
        &self.dir
    }

    /// Writes a finished file holding `hits` and returns its path.
    pub fn add_file(&mut self, hits: Vec<Hit>) -> PathBuf {
        let name = format!("part{}.rch", self.files.len());
        let path = self.dir.write_hits(&name, &hits);
        let valid = !hits.is_empty();
        self.track(path, hits, valid)
    }

    /// Writes a finished file holding `hits` and a named summary.
    pub fn add_file_with_summary(&mut self, hits: Vec<Hit>, name: &str, summary: Summary) -> PathBuf {
        let file_name = format!("part{}.rch", self.files.len());
        let path = self.dir.write_hits_with(&file_name, &hits, &[(name, summary)]);
        let valid = !hits.is_empty();
        self.track(path, hits, valid)
    }

    /// Writes a file that is not a container file.
    pub fn add_corrupt_file(&mut self) -> PathBuf {
        let name = format!("part{}.rch", self.files.len());
        let path = self.dir.write_garbage(&name);
        self.track(path, Vec::new(), false)
    }

    /// Adds a path that does not exist.
    pub fn add_missing_file(&mut self) -> PathBuf {
        let path = self.dir.path(&format!("part{}.rch", self.files.len()));
        self.track(path, Vec::new(), false)
    }

    fn track(&mut self, path: PathBuf, hits: Vec<Hit>, valid: bool) -> PathBuf {
        self.files.push(WrittenFile {
            path: path.clone(),
            hits,
            valid,
        });
        path
    }

    /// Returns every path, in the order added.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }

    /// Returns the files written so far.
    pub fn files(&self) -> &[WrittenFile] {
        &self.files
    }

    /// Returns the hits a reader should see, in chain order.
    pub fn expected_hits(&self) -> Vec<Hit> {
        self.files.iter().flat_map(|f| f.hits.iter().cloned()).collect()
    }

    /// Returns how many files a validity-checking reader should admit.
    pub fn valid_count(&self) -> usize {
        self.files.iter().filter(|f| f.valid).count()
    }

    /// Opens a reader over every file with validity checking.
    pub fn open_checked(&self) -> CoreResult<ChainReader<Hit>> {
        ChainReader::open_with(self.paths(), &ReaderOptions::new().check_validity(true))
    }

    /// Checks size, indexed access and full iteration against what was
    /// written.
    pub fn verify(&self, reader: &mut ChainReader<Hit>) {
        let expected = self.expected_hits();
        assert_eq!(
            reader.len().expect("Failed to get size"),
            expected.len() as u64,
            "Chain size mismatch"
        );

        for (index, hit) in expected.iter().enumerate().rev() {
            let actual = reader.get(index as u64).expect("Failed to get entry");
            assert_eq!(actual, hit, "Entry mismatch at {index}");
        }

        assert_eq!(
            reader.read_all().expect("Failed to read all"),
            expected,
            "Iteration mismatch"
        );
    }
}

impl Default for ChainHarness {
    fn default() -> Self {
        Self::new()
    }
}
