//! Chained record reader.

use crate::chain::{Chain, ChainElement};
use crate::config::ReaderOptions;
use crate::cursor::{Cursor, Entries};
use crate::error::{CoreError, CoreResult};
use crate::stats::ReaderStats;
use crate::types::{Named, ReaderId, Record};
use crate::validity;
use rowchain_codec::{from_cbor, RecordDecoder};
use serde::de::DeserializeOwned;
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

const COMPONENT: &str = "chain reader";

enum State<R> {
    Open(OpenChain<R>),
    /// Opened, but no candidate file was admitted.
    Empty,
    Closed,
}

struct OpenChain<R> {
    chain: Chain,
    /// Chain index of the record held in `buffer`.
    current: Option<u64>,
    buffer: R,
}

/// Reads records of type `R` from a chain of container files as one
/// randomly indexable sequence.
///
/// Record `i` of the chain is record `i - k` of the first file whose
/// preceding files hold `k <= i` records in total. Records are decoded on
/// demand into a single entry buffer, which [`get`](ChainReader::get)
/// lends out until the next access; asking for the index already in the
/// buffer does not decode again.
///
/// # Lifecycle
///
/// A reader is open from construction until [`close`](ChainReader::close)
/// or drop. If no candidate file is admitted, the reader opens empty:
/// [`len`](ChainReader::len) is `0` and record or object access fails
/// with `NoValidFiles`. A failure other than an out-of-range index or a
/// misused cursor closes the reader before it is returned.
///
/// # Example
///
/// ```rust,ignore
/// let mut reader = ChainReader::<Hit>::open(["run1.rch", "run2.rch"])?;
/// for i in 0..reader.len()? {
///     println!("{}", reader.get(i)?.charge);
/// }
/// ```
pub struct ChainReader<R: Record> {
    id: ReaderId,
    container: String,
    field: String,
    state: State<R>,
    decoder: RecordDecoder<R>,
    stats: ReaderStats,
}

impl<R: Record> ChainReader<R> {
    /// Opens a chain with default options.
    ///
    /// # Errors
    ///
    /// See [`open_with`](ChainReader::open_with).
    pub fn open<P: AsRef<Path>>(paths: impl IntoIterator<Item = P>) -> CoreResult<Self> {
        Self::open_with(paths, &ReaderOptions::default())
    }

    /// Opens a chain over a single file.
    ///
    /// # Errors
    ///
    /// See [`open_with`](ChainReader::open_with).
    pub fn open_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        Self::open([path])
    }

    /// Opens a chain over `paths`, admitted in the given order.
    ///
    /// With `check_validity`, candidates failing [`validity::is_valid`]
    /// are skipped. Other candidates are admitted as they are.
    ///
    /// # Errors
    ///
    /// Returns `FieldBindingFailed` if an admitted file stores the
    /// container under another field or record type, and `NoValidFiles`
    /// if nothing was admitted and `require_files` is set.
    pub fn open_with<P: AsRef<Path>>(
        paths: impl IntoIterator<Item = P>,
        options: &ReaderOptions,
    ) -> CoreResult<Self> {
        let container = options
            .container_name
            .clone()
            .unwrap_or_else(R::container_name);
        let field = options.field_name.clone().unwrap_or_else(R::field_name);

        let mut chain = Chain::new(container.clone(), field.clone(), R::NAME);
        let mut admitted = 0;
        for path in paths {
            let path = path.as_ref();
            if options.check_validity
                && !validity::is_valid(path, &container, options.skip_recovered, options.verbose)
            {
                if options.verbose {
                    warn!(path = %path.display(), "skipping file that is not valid");
                }
                continue;
            }
            admitted += chain.add(path)?;
        }

        let id = ReaderId::next();
        let state = if admitted == 0 {
            if options.require_files {
                return Err(CoreError::no_valid_files(container));
            }
            if options.verbose {
                warn!(reader = %id, container = %container, "no valid files");
            } else {
                debug!(reader = %id, container = %container, "no valid files");
            }
            State::Empty
        } else {
            debug!(
                reader = %id,
                container = %container,
                files = admitted,
                entries = chain.len(),
                "opened chain"
            );
            State::Open(OpenChain {
                chain,
                current: None,
                buffer: R::default(),
            })
        };

        Ok(Self {
            id,
            container,
            field,
            state,
            decoder: RecordDecoder::new(),
            stats: ReaderStats::default(),
        })
    }

    /// Returns whether `path` is a usable file for this record type, under
    /// the default container name.
    #[must_use]
    pub fn is_valid(path: impl AsRef<Path>) -> bool {
        validity::is_valid(path.as_ref(), &R::container_name(), false, false)
    }

    /// Returns the identity cursors of this reader carry.
    #[must_use]
    pub fn id(&self) -> ReaderId {
        self.id
    }

    /// Returns the logical container name.
    #[must_use]
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Returns the field name records are read from.
    #[must_use]
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Returns whether the reader has not been closed.
    ///
    /// An empty reader counts as open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !matches!(self.state, State::Closed)
    }

    /// Returns the number of records in the chain.
    ///
    /// # Errors
    ///
    /// Returns `NotOpen` after [`close`](ChainReader::close).
    pub fn len(&self) -> CoreResult<u64> {
        match &self.state {
            State::Open(open) => Ok(open.chain.len()),
            State::Empty => Ok(0),
            State::Closed => Err(CoreError::not_open(COMPONENT)),
        }
    }

    /// Returns whether the chain holds no records.
    ///
    /// # Errors
    ///
    /// Returns `NotOpen` after [`close`](ChainReader::close).
    pub fn is_empty(&self) -> CoreResult<bool> {
        self.len().map(|len| len == 0)
    }

    /// Returns the record at chain index `index`.
    ///
    /// The reference points into the entry buffer and is valid until the
    /// next access.
    ///
    /// # Errors
    ///
    /// Returns `EntryOutOfRange` if `index >= len()`, leaving the buffer
    /// as it was. Read and decode failures close the reader.
    pub fn get(&mut self, index: u64) -> CoreResult<&R> {
        if let Err(e) = self.load(index) {
            return Err(self.fail(e));
        }
        match &self.state {
            State::Open(open) => Ok(&open.buffer),
            _ => Err(CoreError::not_open(COMPONENT)),
        }
    }

    /// Returns the record a cursor points at.
    ///
    /// # Errors
    ///
    /// Returns `CrossReaderIteratorMisuse` for a cursor of another reader,
    /// otherwise as [`get`](ChainReader::get).
    pub fn at(&mut self, cursor: &Cursor) -> CoreResult<&R> {
        cursor.check_same_reader(self.id)?;
        self.get(cursor.index())
    }

    /// Returns a cursor at the first record.
    ///
    /// # Errors
    ///
    /// Returns `NotOpen` after [`close`](ChainReader::close).
    pub fn begin(&self) -> CoreResult<Cursor> {
        self.len()?;
        Ok(Cursor::new(self.id, 0))
    }

    /// Returns a cursor one past the last record.
    ///
    /// # Errors
    ///
    /// Returns `NotOpen` after [`close`](ChainReader::close).
    pub fn end(&self) -> CoreResult<Cursor> {
        Ok(Cursor::new(self.id, self.len()?))
    }

    /// Returns an iterator over copies of all records.
    ///
    /// # Errors
    ///
    /// Returns `NotOpen` after [`close`](ChainReader::close).
    pub fn iter(&mut self) -> CoreResult<Entries<'_, R>>
    where
        R: Clone,
    {
        let end = self.len()?;
        Ok(Entries::new(self, end))
    }

    /// Reads every record, in chain order.
    ///
    /// # Errors
    ///
    /// Returns the first error met; the reader is closed unless it was
    /// already closed.
    pub fn read_all(&mut self) -> CoreResult<Vec<R>>
    where
        R: Clone,
    {
        self.iter()?.collect()
    }

    /// Calls `visit` with each record in chain order until it returns
    /// `false`. Returns the number of records visited.
    ///
    /// # Errors
    ///
    /// Returns the first read error, as [`get`](ChainReader::get).
    pub fn for_each_entry<F>(&mut self, mut visit: F) -> CoreResult<u64>
    where
        F: FnMut(u64, &R) -> bool,
    {
        let len = self.len()?;
        let mut visited = 0;
        for index in 0..len {
            visited += 1;
            if !visit(index, self.get(index)?) {
                break;
            }
        }
        Ok(visited)
    }

    /// Reads the auxiliary object of type `T` stored under its type name.
    ///
    /// # Errors
    ///
    /// See [`object_named`](ChainReader::object_named).
    pub fn object<T: Named + DeserializeOwned>(&mut self) -> CoreResult<T> {
        self.object_named(T::NAME)
    }

    /// Reads the auxiliary object of type `T` called `name` from the first
    /// chain file that holds one.
    ///
    /// The object is decoded fresh on every call.
    ///
    /// # Errors
    ///
    /// Returns `AuxObjectNotFound` if no chain file holds a matching
    /// object. That and any read failure close the reader.
    pub fn object_named<T: Named + DeserializeOwned>(&mut self, name: &str) -> CoreResult<T> {
        let found = self.find_object::<T>(name).and_then(|found| {
            found.ok_or_else(|| CoreError::AuxObjectNotFound {
                name: name.to_string(),
                class: T::NAME,
            })
        });
        found.map_err(|e| self.fail(e))
    }

    /// Returns whether a chain file holds an auxiliary object of type `T`
    /// under its type name.
    ///
    /// # Errors
    ///
    /// See [`has_object_named`](ChainReader::has_object_named).
    pub fn has_object<T: Named>(&self) -> CoreResult<bool> {
        self.has_object_named::<T>(T::NAME)
    }

    /// Returns whether a chain file holds an auxiliary object of type `T`
    /// called `name`.
    ///
    /// # Errors
    ///
    /// Returns `NotOpen` after close, or `NoValidFiles` for an empty
    /// reader.
    pub fn has_object_named<T: Named>(&self, name: &str) -> CoreResult<bool> {
        Ok(self.chain()?.has_object(name, T::NAME))
    }

    /// Enables or disables decoding of the record fields matching
    /// `pattern` (`*` and `?` wildcards) for subsequent accesses.
    ///
    /// Disabled fields read as in `R::default()`. Rules apply in call
    /// order, the last matching one winning. The entry buffer is
    /// invalidated.
    ///
    /// # Errors
    ///
    /// Returns `NotOpen` after close, or `NoValidFiles` for an empty
    /// reader.
    pub fn set_field_enabled(&mut self, pattern: &str, enabled: bool) -> CoreResult<()> {
        let open = match &mut self.state {
            State::Open(open) => open,
            State::Empty => return Err(CoreError::no_valid_files(&self.container)),
            State::Closed => return Err(CoreError::not_open(COMPONENT)),
        };
        open.current = None;
        self.decoder.set_field_enabled(pattern, enabled);
        debug!(reader = %self.id, pattern, enabled, "set field status");
        Ok(())
    }

    /// Returns the admitted files and their record counts.
    ///
    /// # Errors
    ///
    /// Returns `NotOpen` after [`close`](ChainReader::close).
    pub fn chain_files(&self) -> CoreResult<Vec<ChainElement>> {
        match &self.state {
            State::Open(open) => Ok(open.chain.files()),
            State::Empty => Ok(Vec::new()),
            State::Closed => Err(CoreError::not_open(COMPONENT)),
        }
    }

    /// Returns the reader's counters.
    #[must_use]
    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    /// Releases the chain and the entry buffer. Idempotent.
    pub fn close(&mut self) {
        if !matches!(self.state, State::Closed) {
            debug!(reader = %self.id, container = %self.container, "closed chain reader");
        }
        self.state = State::Closed;
    }

    fn chain(&self) -> CoreResult<&Chain> {
        match &self.state {
            State::Open(open) => Ok(&open.chain),
            State::Empty => Err(CoreError::no_valid_files(&self.container)),
            State::Closed => Err(CoreError::not_open(COMPONENT)),
        }
    }

    fn load(&mut self, index: u64) -> CoreResult<()> {
        let open = match &mut self.state {
            State::Open(open) => open,
            State::Empty => return Err(CoreError::no_valid_files(&self.container)),
            State::Closed => return Err(CoreError::not_open(COMPONENT)),
        };

        if open.current == Some(index) {
            self.stats.record_cache_hit();
            return Ok(());
        }

        let loaded = open.chain.load(index)?;
        if loaded.switched {
            self.stats.record_file_load();
        }

        open.current = None;
        self.decoder.decode_into(&loaded.bytes, &mut open.buffer)?;
        open.current = Some(index);
        self.stats.record_decode(loaded.bytes.len());
        Ok(())
    }

    fn find_object<T: Named + DeserializeOwned>(&self, name: &str) -> CoreResult<Option<T>> {
        match self.chain()?.find_object(name, T::NAME)? {
            Some(bytes) => Ok(Some(from_cbor(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Closes the reader unless the error leaves it usable.
    fn fail(&mut self, err: CoreError) -> CoreError {
        let keeps_open = matches!(
            err,
            CoreError::EntryOutOfRange { .. }
                | CoreError::NotOpen { .. }
                | CoreError::NoValidFiles { .. }
                | CoreError::CrossReaderIteratorMisuse
        );
        if !keeps_open {
            warn!(reader = %self.id, error = %err, "closing chain reader after failure");
            self.close();
        }
        err
    }
}

impl<R: Record> Drop for ChainReader<R> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<R: Record> fmt::Debug for ChainReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (state, current) = match &self.state {
            State::Open(open) => ("open", open.current),
            State::Empty => ("empty", None),
            State::Closed => ("closed", None),
        };
        f.debug_struct("ChainReader")
            .field("id", &self.id)
            .field("record_type", &R::NAME)
            .field("container", &self.container)
            .field("field", &self.field)
            .field("state", &state)
            .field("current", &current)
            .field("mask", self.decoder.mask())
            .finish()
    }
}
