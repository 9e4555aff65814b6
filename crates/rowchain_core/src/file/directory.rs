//! Directory of containers and objects held by one file.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// Declaration of a logical record container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDecl {
    /// Container name.
    pub name: String,
    /// Field the records are stored under.
    pub field: String,
    /// Type name of the stored records.
    pub record_type: String,
}

/// A container with the offsets of its record frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerEntry {
    /// The declaration.
    pub decl: ContainerDecl,
    /// Record frame offsets in entry order.
    pub offsets: Vec<u64>,
}

impl ContainerEntry {
    /// Returns the number of records in the container.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.offsets.len() as u64
    }

    /// Returns whether the container holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Location of an auxiliary object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectEntry {
    /// Object name.
    pub name: String,
    /// Type name of the object.
    pub class: String,
    /// Offset of the object frame.
    pub offset: u64,
}

/// Everything a reader needs to locate data in a file.
///
/// Containers are listed in declaration order; a record frame refers to
/// its container by position in this list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Directory {
    /// Declared containers.
    pub containers: Vec<ContainerEntry>,
    /// Written objects, oldest first.
    pub objects: Vec<ObjectEntry>,
}

impl Directory {
    /// Returns the position of the container called `name`.
    #[must_use]
    pub fn container_slot(&self, name: &str) -> Option<usize> {
        self.containers.iter().position(|c| c.decl.name == name)
    }

    /// Returns the container called `name`.
    #[must_use]
    pub fn container(&self, name: &str) -> Option<&ContainerEntry> {
        self.container_slot(name).map(|slot| &self.containers[slot])
    }

    /// Returns the newest object matching `name` and `class`.
    #[must_use]
    pub fn object(&self, name: &str, class: &str) -> Option<&ObjectEntry> {
        self.objects
            .iter()
            .rev()
            .find(|o| o.name == name && o.class == class)
    }

    /// Checks that every offset points inside `[start, end)`.
    ///
    /// # Errors
    ///
    /// Returns a corruption error naming the first offending offset.
    pub fn check_bounds(&self, start: u64, end: u64) -> CoreResult<()> {
        let offsets = self
            .containers
            .iter()
            .flat_map(|c| c.offsets.iter().copied())
            .chain(self.objects.iter().map(|o| o.offset));

        for offset in offsets {
            if offset < start || offset >= end {
                return Err(CoreError::corrupted(format!(
                    "directory offset {offset} outside data region {start}..{end}"
                )));
            }
        }
        Ok(())
    }
}

/// Payload of an object frame:
///
/// ```text
/// | name_len (2) | name | class_len (2) | class | data |
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectPayload {
    /// Object name.
    pub name: String,
    /// Type name of the object.
    pub class: String,
    /// CBOR bytes of the object.
    pub data: Vec<u8>,
}

impl ObjectPayload {
    /// Encodes the payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or class exceeds 65535 bytes.
    pub fn encode(name: &str, class: &str, data: &[u8]) -> CoreResult<Vec<u8>> {
        let mut buf = Vec::with_capacity(4 + name.len() + class.len() + data.len());
        put_str(&mut buf, name)?;
        put_str(&mut buf, class)?;
        buf.extend_from_slice(data);
        Ok(buf)
    }

    /// Decodes a payload.
    ///
    /// # Errors
    ///
    /// Returns a corruption error if the payload is malformed.
    pub fn decode(payload: &[u8]) -> CoreResult<Self> {
        let (name, rest) = take_str(payload)?;
        let (class, data) = take_str(rest)?;
        Ok(Self {
            name,
            class,
            data: data.to_vec(),
        })
    }
}

fn put_str(buf: &mut Vec<u8>, s: &str) -> CoreResult<()> {
    let len = u16::try_from(s.len())
        .map_err(|_| CoreError::corrupted(format!("name too long: {} bytes", s.len())))?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

fn take_str(data: &[u8]) -> CoreResult<(String, &[u8])> {
    if data.len() < 2 {
        return Err(CoreError::corrupted("object payload truncated"));
    }
    let len = u16::from_le_bytes([data[0], data[1]]) as usize;
    let rest = &data[2..];
    if rest.len() < len {
        return Err(CoreError::corrupted("object payload truncated"));
    }
    let s = std::str::from_utf8(&rest[..len])
        .map_err(|_| CoreError::corrupted("object name is not UTF-8"))?;
    Ok((s.to_string(), &rest[len..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl(name: &str) -> ContainerDecl {
        ContainerDecl {
            name: name.into(),
            field: "Hit".into(),
            record_type: "Hit".into(),
        }
    }

    #[test]
    fn lookup_by_name() {
        let dir = Directory {
            containers: vec![
                ContainerEntry {
                    decl: decl("A"),
                    offsets: vec![16],
                },
                ContainerEntry {
                    decl: decl("B"),
                    offsets: vec![],
                },
            ],
            objects: vec![],
        };

        assert_eq!(dir.container_slot("B"), Some(1));
        assert_eq!(dir.container("A").unwrap().len(), 1);
        assert!(dir.container("B").unwrap().is_empty());
        assert!(dir.container("C").is_none());
    }

    #[test]
    fn newest_object_wins_and_class_must_match() {
        let object = |class: &str, offset| ObjectEntry {
            name: "calib".into(),
            class: class.into(),
            offset,
        };
        let dir = Directory {
            containers: vec![],
            objects: vec![object("Calib", 16), object("Other", 40), object("Calib", 80)],
        };

        assert_eq!(dir.object("calib", "Calib").unwrap().offset, 80);
        assert_eq!(dir.object("calib", "Other").unwrap().offset, 40);
        assert!(dir.object("calib", "Missing").is_none());
    }

    #[test]
    fn bounds_check() {
        let dir = Directory {
            containers: vec![ContainerEntry {
                decl: decl("A"),
                offsets: vec![16, 200],
            }],
            objects: vec![],
        };
        assert!(dir.check_bounds(16, 300).is_ok());
        assert!(dir.check_bounds(16, 100).is_err());
    }

    #[test]
    fn object_payload_roundtrip() {
        let bytes = ObjectPayload::encode("run-summary", "Summary", &[1, 2, 3]).unwrap();
        let payload = ObjectPayload::decode(&bytes).unwrap();
        assert_eq!(payload.name, "run-summary");
        assert_eq!(payload.class, "Summary");
        assert_eq!(payload.data, vec![1, 2, 3]);
    }

    #[test]
    fn object_payload_truncated() {
        let bytes = ObjectPayload::encode("run-summary", "Summary", &[]).unwrap();
        assert!(ObjectPayload::decode(&bytes[..5]).is_err());
        assert!(ObjectPayload::decode(&[]).is_err());
    }
}
