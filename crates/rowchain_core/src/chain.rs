//! Ordered set of container files read as one index space.

use crate::error::{CoreError, CoreResult};
use crate::file::ContainerFile;
use rowchain_storage::FileBackend;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A file admitted to a chain, with the number of records it contributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainElement {
    /// Path of the file.
    pub path: PathBuf,
    /// Records of the chained container held by the file.
    pub entries: u64,
}

#[derive(Debug)]
struct Member {
    path: PathBuf,
    entries: u64,
    /// Chain index of the member's first record.
    first: u64,
}

#[derive(Debug)]
struct LoadedFile {
    member: usize,
    file: ContainerFile<FileBackend>,
    slot: usize,
}

/// One record read from a chain.
#[derive(Debug)]
pub(crate) struct Loaded {
    /// Encoded record.
    pub bytes: Vec<u8>,
    /// Whether a different member file had to be opened.
    pub switched: bool,
}

/// The files of a chain, in admission order.
///
/// Members are immutable once added. At most one member file is held
/// open, the one that served the latest record.
#[derive(Debug)]
pub(crate) struct Chain {
    container: String,
    field: String,
    record_type: &'static str,
    members: Vec<Member>,
    total: u64,
    loaded: Option<LoadedFile>,
}

impl Chain {
    pub fn new(container: String, field: String, record_type: &'static str) -> Self {
        Self {
            container,
            field,
            record_type,
            members: Vec::new(),
            total: 0,
            loaded: None,
        }
    }

    /// Admits a file and returns the number of files added.
    ///
    /// A file that cannot be opened, or does not hold the container, is
    /// still admitted with no records.
    ///
    /// # Errors
    ///
    /// Returns `FieldBindingFailed` if the file's container stores a
    /// different field or record type.
    pub fn add(&mut self, path: &Path) -> CoreResult<usize> {
        let entries = match open_container_file(path) {
            Ok(file) => match file.container(&self.container) {
                Some(entry) => {
                    if entry.decl.field != self.field || entry.decl.record_type != self.record_type
                    {
                        return Err(CoreError::field_binding(format!(
                            "container '{}' in '{}' stores field '{}' of type '{}', expected '{}' of type '{}'",
                            self.container,
                            path.display(),
                            entry.decl.field,
                            entry.decl.record_type,
                            self.field,
                            self.record_type
                        )));
                    }
                    entry.len()
                }
                None => {
                    warn!(path = %path.display(), container = %self.container, "chained file has no such container");
                    0
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "chained file cannot be opened");
                0
            }
        };

        self.members.push(Member {
            path: path.to_path_buf(),
            entries,
            first: self.total,
        });
        self.total += entries;
        debug!(path = %path.display(), entries, total = self.total, "added file to chain");
        Ok(1)
    }

    /// Returns the total number of records.
    pub fn len(&self) -> u64 {
        self.total
    }

    /// Returns the admitted files with their record counts.
    pub fn files(&self) -> Vec<ChainElement> {
        self.members
            .iter()
            .map(|m| ChainElement {
                path: m.path.clone(),
                entries: m.entries,
            })
            .collect()
    }

    /// Reads the encoded record at chain index `index`.
    ///
    /// # Errors
    ///
    /// Returns `EntryOutOfRange` past the end, or an error if the member
    /// file no longer matches what was admitted.
    pub fn load(&mut self, index: u64) -> CoreResult<Loaded> {
        if index >= self.total {
            return Err(CoreError::EntryOutOfRange {
                index,
                size: self.total,
            });
        }

        let member = self
            .members
            .partition_point(|m| m.first + m.entries <= index);
        let local = index - self.members[member].first;

        let switched = self.loaded.as_ref().map_or(true, |l| l.member != member);
        if switched {
            self.loaded = None;
            let path = &self.members[member].path;
            let file = open_container_file(path)?;
            let slot = file.container_slot(&self.container).ok_or_else(|| {
                CoreError::open_failed(path, format!("container '{}' disappeared", self.container))
            })?;
            debug!(path = %path.display(), member, "switched chain file");
            self.loaded = Some(LoadedFile { member, file, slot });
        }

        let loaded = self
            .loaded
            .as_ref()
            .ok_or_else(|| CoreError::not_open("chain"))?;
        let bytes = loaded.file.read_record(loaded.slot, local)?.ok_or_else(|| {
            CoreError::corrupted(format!(
                "record {local} missing from '{}'",
                self.members[member].path.display()
            ))
        })?;
        Ok(Loaded { bytes, switched })
    }

    /// Returns whether any member holds an object with this name and type.
    pub fn has_object(&self, name: &str, class: &str) -> bool {
        self.members.iter().any(|m| {
            open_container_file(&m.path).is_ok_and(|file| file.has_object(name, class))
        })
    }

    /// Reads the first object with this name and type, in chain order.
    ///
    /// Members are opened one at a time and closed again; members that
    /// cannot be opened are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the matching object frame is damaged.
    pub fn find_object(&self, name: &str, class: &str) -> CoreResult<Option<Vec<u8>>> {
        for member in &self.members {
            let file = match open_container_file(&member.path) {
                Ok(file) => file,
                Err(e) => {
                    debug!(path = %member.path.display(), error = %e, "skipping file in object lookup");
                    continue;
                }
            };
            if let Some(data) = file.read_object(name, class)? {
                debug!(path = %member.path.display(), name, class, "found object");
                return Ok(Some(data));
            }
        }
        Ok(None)
    }
}

fn open_container_file(path: &Path) -> CoreResult<ContainerFile<FileBackend>> {
    let backend = FileBackend::open(path).map_err(|e| CoreError::open_failed(path, e))?;
    ContainerFile::open(backend).map_err(|e| CoreError::open_failed(path, e))
}
