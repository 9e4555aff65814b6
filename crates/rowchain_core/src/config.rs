//! Reader and writer configuration.

use rowchain_storage::DEFAULT_BUFFER_SIZE;

/// Default compression level recorded in new container files.
pub const DEFAULT_COMPRESSION: u32 = 1;

/// Options for opening a [`ChainReader`](crate::ChainReader).
#[derive(Debug, Clone, Default)]
pub struct ReaderOptions {
    /// Logical container to read; `None` means `<NAME>Container`.
    pub container_name: Option<String>,

    /// Field the record is stored under; `None` means `<NAME>`.
    pub field_name: Option<String>,

    /// Run the validity checker on each candidate before admitting it.
    pub check_validity: bool,

    /// Reject files flagged as recovered (only with `check_validity`).
    pub skip_recovered: bool,

    /// Log rejected files at warn level instead of debug.
    pub verbose: bool,

    /// Fail the open with `NoValidFiles` instead of yielding an empty
    /// reader when no candidate is admitted.
    pub require_files: bool,
}

impl ReaderOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the logical container name.
    #[must_use]
    pub fn container_name(mut self, name: impl Into<String>) -> Self {
        self.container_name = Some(name.into());
        self
    }

    /// Sets the field name.
    #[must_use]
    pub fn field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = Some(name.into());
        self
    }

    /// Sets whether candidates are validity-checked.
    #[must_use]
    pub const fn check_validity(mut self, value: bool) -> Self {
        self.check_validity = value;
        self
    }

    /// Sets whether recovered files are rejected.
    #[must_use]
    pub const fn skip_recovered(mut self, value: bool) -> Self {
        self.skip_recovered = value;
        self
    }

    /// Sets whether rejections are logged at warn level.
    #[must_use]
    pub const fn verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Sets whether an empty chain is an error.
    #[must_use]
    pub const fn require_files(mut self, value: bool) -> Self {
        self.require_files = value;
        self
    }
}

/// Options for opening a [`RecordWriter`](crate::RecordWriter).
#[derive(Debug, Clone)]
pub struct WriterOptions {
    /// Compression level recorded in the file header.
    pub compression: u32,

    /// Capacity of the output write buffer in bytes.
    pub buffer_size: usize,

    /// Size after which output rolls over to a new file (`None` = never).
    pub max_output_size: Option<u64>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            compression: DEFAULT_COMPRESSION,
            buffer_size: DEFAULT_BUFFER_SIZE,
            max_output_size: None,
        }
    }
}

impl WriterOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the compression level.
    #[must_use]
    pub const fn compression(mut self, level: u32) -> Self {
        self.compression = level;
        self
    }

    /// Sets the write buffer capacity.
    #[must_use]
    pub const fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Sets the rollover threshold.
    #[must_use]
    pub const fn max_output_size(mut self, size: u64) -> Self {
        self.max_output_size = Some(size);
        self
    }
}
