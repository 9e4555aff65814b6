//! Forward cursors over a chain reader.

use crate::error::{CoreError, CoreResult};
use crate::reader::ChainReader;
use crate::types::{Record, ReaderId};

/// A position in one [`ChainReader`].
///
/// A cursor is a plain value: it borrows nothing and is dereferenced
/// through the reader that made it, with [`ChainReader::at`]. It remembers
/// which reader that was, and refuses to be compared with, or resolved
/// through, any other.
///
/// Cursors deliberately do not implement `PartialEq`; use
/// [`try_eq`](Cursor::try_eq) and [`try_ne`](Cursor::try_ne).
///
/// ```rust,ignore
/// let mut it = reader.begin()?;
/// let end = reader.end()?;
/// while it.try_ne(&end)? {
///     let hit = reader.at(&it)?;
///     it.advance();
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Cursor {
    reader: ReaderId,
    index: u64,
}

impl Cursor {
    pub(crate) const fn new(reader: ReaderId, index: u64) -> Self {
        Self { reader, index }
    }

    /// Returns the chain index the cursor points at.
    #[must_use]
    pub const fn index(&self) -> u64 {
        self.index
    }

    /// Returns the identity of the reader the cursor belongs to.
    #[must_use]
    pub const fn reader(&self) -> ReaderId {
        self.reader
    }

    /// Moves to the next entry.
    pub fn advance(&mut self) -> &mut Self {
        self.advance_by(1)
    }

    /// Moves `n` entries forward.
    pub fn advance_by(&mut self, n: u64) -> &mut Self {
        self.index = self.index.saturating_add(n);
        self
    }

    /// Returns whether both cursors point at the same entry.
    ///
    /// # Errors
    ///
    /// Returns `CrossReaderIteratorMisuse` if the cursors belong to
    /// different readers, whatever their indices.
    pub fn try_eq(&self, other: &Cursor) -> CoreResult<bool> {
        self.check_same_reader(other.reader)?;
        Ok(self.index == other.index)
    }

    /// Returns whether the cursors point at different entries.
    ///
    /// # Errors
    ///
    /// Returns `CrossReaderIteratorMisuse` if the cursors belong to
    /// different readers.
    pub fn try_ne(&self, other: &Cursor) -> CoreResult<bool> {
        self.try_eq(other).map(|eq| !eq)
    }

    pub(crate) fn check_same_reader(&self, reader: ReaderId) -> CoreResult<()> {
        if self.reader == reader {
            Ok(())
        } else {
            Err(CoreError::CrossReaderIteratorMisuse)
        }
    }
}

/// Iterator over owned copies of a reader's records, in chain order.
///
/// Created by [`ChainReader::iter`]. Each item goes through the reader's
/// entry buffer, so the reader's cache holds the last yielded record.
/// Iteration stops after the first error.
pub struct Entries<'a, R: Record> {
    reader: &'a mut ChainReader<R>,
    next: u64,
    end: u64,
}

impl<'a, R: Record> Entries<'a, R> {
    pub(crate) fn new(reader: &'a mut ChainReader<R>, end: u64) -> Self {
        Self {
            reader,
            next: 0,
            end,
        }
    }
}

impl<R: Record + Clone> Iterator for Entries<'_, R> {
    type Item = CoreResult<R>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let index = self.next;
        self.next += 1;

        let item = self.reader.get(index).cloned();
        if item.is_err() {
            self.next = self.end;
        }
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::try_from(self.end - self.next).unwrap_or(usize::MAX);
        (0, Some(remaining))
    }
}
