//! Benchmark utilities.

use rand::Rng;
use rowchain_core::{Named, RecordWriter, WriterOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The benchmark record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Sequence number.
    pub seq: u64,
    /// Channel number.
    pub channel: u32,
    /// Measured amplitude.
    pub amplitude: f64,
    /// Raw trace.
    pub trace: Vec<u16>,
}

impl Named for Sample {
    const NAME: &'static str = "Sample";
}

/// Generate random samples with traces of `trace_len` points.
pub fn random_samples(count: usize, trace_len: usize) -> Vec<Sample> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|seq| Sample {
            seq: seq as u64,
            channel: rng.gen_range(0..128),
            amplitude: rng.gen(),
            trace: (0..trace_len).map(|_| rng.gen()).collect(),
        })
        .collect()
}

/// Generate `count` random indices below `len`.
pub fn random_indices(count: usize, len: u64) -> Vec<u64> {
    let mut rng = rand::thread_rng();
    (0..count).map(|_| rng.gen_range(0..len)).collect()
}

/// Write `files` chain files of `per_file` samples each into `dir`.
pub fn write_chain(dir: &Path, files: usize, per_file: usize, trace_len: usize) -> Vec<PathBuf> {
    (0..files)
        .map(|i| {
            let path = dir.join(format!("chain{i}.rch"));
            let mut writer = RecordWriter::<Sample>::open_with(&path, WriterOptions::default())
                .expect("Failed to open writer");
            writer
                .fill_all(&random_samples(per_file, trace_len))
                .expect("Failed to write samples");
            writer.close().expect("Failed to close writer");
            path
        })
        .collect()
}
