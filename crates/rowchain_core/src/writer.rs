//! Sequential record writer.

use crate::config::WriterOptions;
use crate::error::{CoreError, CoreResult};
use crate::file::{ContainerSlot, ContainerWriter, FileHeader};
use crate::stats::WriterStats;
use crate::types::{Named, Record};
use rowchain_codec::to_cbor;
use rowchain_storage::FileBackend;
use serde::Serialize;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const COMPONENT: &str = "record writer";

#[derive(Debug)]
struct Output {
    path: PathBuf,
    file: ContainerWriter<FileBackend>,
    slot: ContainerSlot,
}

/// Writes records of type `R` to a container file, in order.
///
/// The file gets one logical container, `<NAME>Container`, holding the
/// records under field `<NAME>`. Auxiliary objects can be stored next to
/// it. The file is finalized by [`close`](RecordWriter::close), which also
/// runs on drop; a file whose writer never closed is read back as
/// recovered.
///
/// With a maximum output size, a file that grows past it is finalized
/// when the next record arrives, and writing continues in
/// `<stem>_1.<ext>`, `<stem>_2.<ext>` and so on, each holding the same
/// container. Objects always go to the current file.
///
/// ```rust,ignore
/// let mut writer = RecordWriter::<Hit>::open("run1.rch")?;
/// writer.fill(&hit)?;
/// writer.write(&summary)?;
/// writer.close()?;
/// ```
#[derive(Debug)]
pub struct RecordWriter<R: Record> {
    base: PathBuf,
    options: WriterOptions,
    output: Option<Output>,
    outputs: Vec<PathBuf>,
    rollover_pending: bool,
    stats: WriterStats,
    _marker: PhantomData<fn(&R)>,
}

impl<R: Record> RecordWriter<R> {
    /// Creates `path` with default options, truncating an existing file.
    ///
    /// # Errors
    ///
    /// See [`open_with`](RecordWriter::open_with).
    pub fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        Self::open_with(path, WriterOptions::default())
    }

    /// Creates `path`, truncating an existing file.
    ///
    /// # Errors
    ///
    /// Returns `OpenFailed` if the file cannot be created, and
    /// `FieldBindingFailed` if the record container cannot be declared.
    pub fn open_with(path: impl AsRef<Path>, options: WriterOptions) -> CoreResult<Self> {
        let base = path.as_ref().to_path_buf();
        let output = create_output::<R>(&base, &options)?;
        debug!(
            path = %base.display(),
            container = %R::container_name(),
            compression = options.compression,
            buffer_size = options.buffer_size,
            "opened record writer"
        );

        Ok(Self {
            outputs: vec![base.clone()],
            base,
            options,
            output: Some(output),
            rollover_pending: false,
            stats: WriterStats::default(),
            _marker: PhantomData,
        })
    }

    /// Appends one record.
    ///
    /// The record is encoded before returning and may be dropped or
    /// reused afterwards.
    ///
    /// # Errors
    ///
    /// Returns `NotOpen` after close. Encode and write failures close the
    /// writer.
    pub fn fill(&mut self, record: &R) -> CoreResult<()> {
        self.append(record).map_err(|e| self.fail(e))
    }

    /// Appends every record of a slice, in order.
    ///
    /// # Errors
    ///
    /// Stops at the first failure, as [`fill`](RecordWriter::fill).
    pub fn fill_all(&mut self, records: &[R]) -> CoreResult<()> {
        self.extend(records)
    }

    /// Appends every record yielded by `records`, in order.
    ///
    /// # Errors
    ///
    /// Stops at the first failure, as [`fill`](RecordWriter::fill).
    pub fn extend<'r>(&mut self, records: impl IntoIterator<Item = &'r R>) -> CoreResult<()>
    where
        R: 'r,
    {
        for record in records {
            self.fill(record)?;
        }
        Ok(())
    }

    /// Stores an auxiliary object under its type name.
    ///
    /// # Errors
    ///
    /// See [`write_as`](RecordWriter::write_as).
    pub fn write<T: Named + Serialize>(&mut self, object: &T) -> CoreResult<()> {
        self.write_as(object, T::NAME)
    }

    /// Stores an auxiliary object called `name` in the current file.
    ///
    /// # Errors
    ///
    /// Returns `NotOpen` after close. Encode and write failures close the
    /// writer.
    pub fn write_as<T: Named + Serialize>(&mut self, object: &T, name: &str) -> CoreResult<()> {
        self.store_object(object, name).map_err(|e| self.fail(e))
    }

    /// Sets the size after which output rolls over to a new file.
    pub fn set_max_output_size(&mut self, size: u64) {
        self.options.max_output_size = Some(size);
    }

    /// Finalizes and releases the current file. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be written or synced. The
    /// writer is closed either way.
    pub fn close(&mut self) -> CoreResult<()> {
        self.rollover_pending = false;
        let Some(output) = self.output.take() else {
            return Ok(());
        };
        if !output.file.is_writable() {
            return Ok(());
        }

        output.file.finish()?;
        self.stats.record_file_finished();
        debug!(
            path = %output.path.display(),
            records = self.stats.records_written,
            files = self.outputs.len(),
            "closed record writer"
        );
        Ok(())
    }

    /// Returns whether the writer accepts records.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.output.is_some()
    }

    /// Returns the file currently written, if open.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.output.as_ref().map(|o| o.path.as_path())
    }

    /// Returns every file created so far, rollovers included, in order.
    #[must_use]
    pub fn output_paths(&self) -> &[PathBuf] {
        &self.outputs
    }

    /// Returns the number of records appended across all files.
    #[must_use]
    pub fn records_written(&self) -> u64 {
        self.stats.records_written
    }

    /// Returns the writer's counters.
    #[must_use]
    pub fn stats(&self) -> WriterStats {
        self.stats
    }

    fn append(&mut self, record: &R) -> CoreResult<()> {
        if self.output.is_some() && self.rollover_pending {
            self.rollover()?;
        }
        let output = self
            .output
            .as_mut()
            .ok_or_else(|| CoreError::not_open(COMPONENT))?;
        let bytes = to_cbor(record)?;
        output.file.container(output.slot)?.append(&bytes)?;
        self.stats.record_entry(bytes.len());

        if let Some(max) = self.options.max_output_size {
            self.rollover_pending = output.file.size()? >= max;
        }
        Ok(())
    }

    fn store_object<T: Named + Serialize>(&mut self, object: &T, name: &str) -> CoreResult<()> {
        let output = self
            .output
            .as_mut()
            .ok_or_else(|| CoreError::not_open(COMPONENT))?;
        let bytes = to_cbor(object)?;
        output.file.write_object(name, T::NAME, &bytes)?;
        self.stats.record_object(bytes.len());
        Ok(())
    }

    fn rollover(&mut self) -> CoreResult<()> {
        let next = rollover_path(&self.base, self.outputs.len());
        self.close()?;

        let output = create_output::<R>(&next, &self.options)?;
        debug!(path = %next.display(), "rolled over to new file");
        self.outputs.push(next);
        self.output = Some(output);
        Ok(())
    }

    /// Closes the writer and hands back `err`.
    fn fail(&mut self, err: CoreError) -> CoreError {
        if self.output.is_some() {
            warn!(error = %err, "closing record writer after failure");
            if let Err(close_err) = self.close() {
                warn!(error = %close_err, "record writer close failed");
            }
        }
        err
    }
}

impl<R: Record> Drop for RecordWriter<R> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = %self.base.display(), error = %e, "record writer close on drop failed");
        }
    }
}

fn create_output<R: Record>(path: &Path, options: &WriterOptions) -> CoreResult<Output> {
    let buffer_size = u32::try_from(options.buffer_size).unwrap_or(u32::MAX);
    let backend =
        FileBackend::create(path, options.buffer_size).map_err(|e| CoreError::open_failed(path, e))?;
    let mut file = ContainerWriter::create(
        backend,
        FileHeader::new(options.compression, buffer_size),
    )
    .map_err(|e| CoreError::open_failed(path, e))?;

    let slot = file
        .declare_container(&R::container_name(), &R::field_name(), R::NAME)
        .map_err(|e| match e {
            CoreError::FieldBindingFailed { .. } => e,
            other => CoreError::field_binding(other.to_string()),
        })?;

    Ok(Output {
        path: path.to_path_buf(),
        file,
        slot,
    })
}

/// Returns `<stem>_<n>.<ext>` next to `base`.
fn rollover_path(base: &Path, n: usize) -> PathBuf {
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match base.extension() {
        Some(ext) => format!("{stem}_{n}.{}", ext.to_string_lossy()),
        None => format!("{stem}_{n}"),
    };
    base.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::ChainReader;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    struct Hit {
        channel: u32,
        charge: f64,
    }

    impl Named for Hit {
        const NAME: &'static str = "Hit";
    }

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Summary {
        events: u64,
    }

    impl Named for Summary {
        const NAME: &'static str = "Summary";
    }

    fn hits(n: u32) -> Vec<Hit> {
        (0..n)
            .map(|channel| Hit {
                channel,
                charge: f64::from(channel),
            })
            .collect()
    }

    #[test]
    fn written_records_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.rch");

        let mut writer = RecordWriter::<Hit>::open(&path).unwrap();
        writer.fill_all(&hits(5)).unwrap();
        assert_eq!(writer.records_written(), 5);
        assert_eq!(writer.path(), Some(path.as_path()));
        writer.close().unwrap();

        let mut reader = ChainReader::<Hit>::open_file(&path).unwrap();
        assert_eq!(reader.read_all().unwrap(), hits(5));
    }

    #[test]
    fn header_records_options() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.rch");

        let options = WriterOptions::new().compression(7).buffer_size(4096);
        let mut writer = RecordWriter::<Hit>::open_with(&path, options).unwrap();
        writer.close().unwrap();

        let backend = FileBackend::open(&path).unwrap();
        let file = crate::file::ContainerFile::open(backend).unwrap();
        assert_eq!(file.header().compression, 7);
        assert_eq!(file.header().buffer_size, 4096);
        let decl = &file.container("HitContainer").unwrap().decl;
        assert_eq!(decl.field, "Hit");
        assert_eq!(decl.record_type, "Hit");
    }

    #[test]
    fn close_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.rch");

        let mut writer = RecordWriter::<Hit>::open(&path).unwrap();
        writer.fill(&Hit::default()).unwrap();
        writer.close().unwrap();
        let size = std::fs::metadata(&path).unwrap().len();

        writer.close().unwrap();
        assert!(!writer.is_open());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), size);
        assert_eq!(writer.stats().files_finished, 1);
    }

    #[test]
    fn closed_writer_rejects_data() {
        let dir = tempdir().unwrap();
        let mut writer = RecordWriter::<Hit>::open(dir.path().join("out.rch")).unwrap();
        writer.close().unwrap();

        assert!(matches!(
            writer.fill(&Hit::default()),
            Err(CoreError::NotOpen { .. })
        ));
        assert!(matches!(
            writer.write(&Summary::default()),
            Err(CoreError::NotOpen { .. })
        ));
    }

    #[test]
    fn drop_finalizes_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.rch");
        {
            let mut writer = RecordWriter::<Hit>::open(&path).unwrap();
            writer.extend(hits(3).iter()).unwrap();
        }

        assert!(crate::validity::check_validity(&path, "HitContainer", true).is_ok());
    }

    #[test]
    fn unwritable_path_fails_open() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("out.rch");
        assert!(matches!(
            RecordWriter::<Hit>::open(&path),
            Err(CoreError::OpenFailed { .. })
        ));
    }

    #[test]
    fn rollover_splits_output() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.rch");

        let mut writer = RecordWriter::<Hit>::open(&path).unwrap();
        writer.set_max_output_size(200);
        writer.fill_all(&hits(40)).unwrap();
        writer.write(&Summary { events: 40 }).unwrap();
        writer.close().unwrap();

        let outputs = writer.output_paths().to_vec();
        assert!(outputs.len() > 1);
        assert_eq!(outputs[0], path);
        assert_eq!(outputs[1], dir.path().join("out_1.rch"));
        assert_eq!(writer.stats().files_finished, outputs.len() as u64);

        let mut reader = ChainReader::<Hit>::open(&outputs).unwrap();
        assert_eq!(reader.read_all().unwrap(), hits(40));
        assert_eq!(reader.object::<Summary>().unwrap().events, 40);
    }

    #[test]
    fn crossing_record_does_not_leave_an_empty_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.rch");

        let mut writer = RecordWriter::<Hit>::open(&path).unwrap();
        writer.set_max_output_size(1);
        writer.fill(&Hit { channel: 1, charge: 1.0 }).unwrap();
        writer.write(&Summary { events: 1 }).unwrap();
        writer.close().unwrap();

        assert_eq!(writer.output_paths(), [path.clone()]);
        assert!(!dir.path().join("out_1.rch").exists());

        let mut reader = ChainReader::<Hit>::open_file(&path).unwrap();
        assert_eq!(reader.len().unwrap(), 1);
        assert_eq!(reader.object::<Summary>().unwrap().events, 1);
    }

    #[test]
    fn rollover_happens_on_next_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.rch");

        let mut writer = RecordWriter::<Hit>::open(&path).unwrap();
        writer.set_max_output_size(1);
        writer.fill_all(&hits(3)).unwrap();
        assert_eq!(writer.path(), Some(dir.path().join("out_2.rch").as_path()));
        writer.close().unwrap();

        let outputs = writer.output_paths().to_vec();
        assert_eq!(outputs.len(), 3);
        for output in &outputs {
            assert!(crate::validity::check_validity(output, "HitContainer", true).is_ok());
        }

        let mut reader = ChainReader::<Hit>::open(&outputs).unwrap();
        let entries: Vec<u64> = reader.chain_files().unwrap().iter().map(|f| f.entries).collect();
        assert_eq!(entries, vec![1, 1, 1]);
        assert_eq!(reader.read_all().unwrap(), hits(3));
    }

    #[test]
    fn rollover_names() {
        assert_eq!(
            rollover_path(Path::new("/data/run.rch"), 2),
            PathBuf::from("/data/run_2.rch")
        );
        assert_eq!(
            rollover_path(Path::new("run"), 1),
            PathBuf::from("run_1")
        );
    }
}
