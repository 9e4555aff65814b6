//! Core type definitions for rowchain.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A type with a stable, process-independent name.
///
/// Records use the name for their default container (`<NAME>Container`)
/// and field (`<NAME>`). Auxiliary objects are stored under it unless an
/// explicit name is given, and lookups match it against the stored type.
///
/// ```
/// use rowchain_core::Named;
///
/// struct RunSummary;
///
/// impl Named for RunSummary {
///     const NAME: &'static str = "RunSummary";
/// }
/// ```
pub trait Named {
    /// The stable type name.
    const NAME: &'static str;
}

/// A record that can live in a rowchain container.
///
/// Implemented for every `Named + Default + Serialize + DeserializeOwned`
/// type; there is nothing to implement by hand.
pub trait Record: Named + Default + Serialize + DeserializeOwned {
    /// Default logical container name, `<NAME>Container`.
    #[must_use]
    fn container_name() -> String {
        format!("{}Container", Self::NAME)
    }

    /// Default field name, `<NAME>`.
    #[must_use]
    fn field_name() -> String {
        Self::NAME.to_string()
    }
}

impl<T> Record for T where T: Named + Default + Serialize + DeserializeOwned {}

/// Identity of one chain reader instance.
///
/// Cursors carry the id of the reader that created them, which is how
/// comparisons between cursors of different readers are detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReaderId(u64);

impl ReaderId {
    /// Allocates an id that no other reader in this process holds.
    #[must_use]
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ReaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "reader:{}", self.0)
    }
}
