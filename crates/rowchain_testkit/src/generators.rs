//! Property-based test generators using proptest.
//!
//! Provides strategies for generating records and chain layouts.

use crate::fixtures::{Hit, Summary};
use proptest::prelude::*;

/// Strategy for generating hits.
pub fn hit_strategy() -> impl Strategy<Value = Hit> {
    (
        any::<u32>(),
        -1.0e6f64..1.0e6,
        any::<u64>(),
        prop::string::string_regex("[a-z0-9-]{0,16}").expect("Invalid regex"),
    )
        .prop_map(|(channel, charge, time_ns, tag)| Hit {
            channel,
            charge,
            time_ns,
            tag,
        })
}

/// Strategy for generating a sequence of hits.
pub fn hits_strategy(max_len: usize) -> impl Strategy<Value = Vec<Hit>> {
    prop::collection::vec(hit_strategy(), 0..max_len)
}

/// Strategy for generating summaries.
pub fn summary_strategy() -> impl Strategy<Value = Summary> {
    (any::<u32>(), any::<u64>()).prop_map(|(run, hits)| Summary { run, hits })
}

/// Strategy for generating the contents of a chain: one hit sequence per
/// file, some possibly empty.
pub fn chain_layout_strategy(
    max_files: usize,
    max_per_file: usize,
) -> impl Strategy<Value = Vec<Vec<Hit>>> {
    prop::collection::vec(hits_strategy(max_per_file), 1..max_files)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 64,
            max_shrink_iters: 500,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 16,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 512,
            max_shrink_iters: 5000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
