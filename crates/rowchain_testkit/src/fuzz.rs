//! Fuzz testing harnesses for rowchain.
//!
//! This module provides fuzz targets that can be used with cargo-fuzz
//! or other fuzzing frameworks. Every target must return normally for
//! any input; errors are expected, panics are bugs.

use crate::fixtures::Hit;
use rowchain_codec::{from_cbor, RecordDecoder};
use rowchain_core::file::{ContainerFile, ContainerWriter, FileHeader};
use rowchain_core::{Named, Record};
use rowchain_storage::InMemoryBackend;

/// Fuzz target for opening arbitrary bytes as a container file.
///
/// Whatever opens must also survive reading every record and object the
/// directory lists.
pub fn fuzz_container_open(data: &[u8]) {
    let Ok(file) = ContainerFile::open(InMemoryBackend::read_only(data.to_vec())) else {
        return;
    };

    for (slot, entry) in file.directory().containers.iter().enumerate() {
        for index in 0..entry.len() {
            let _ = file.read_record(slot, index);
        }
    }
    for object in &file.directory().objects {
        let _ = file.read_object(&object.name, &object.class);
    }
}

/// Fuzz target for damaging a valid file.
///
/// Builds a small file, overwrites bytes at positions taken from `data`,
/// and opens the result.
pub fn fuzz_damaged_file(data: &[u8]) {
    let mut image = sample_image();
    for pair in data.chunks_exact(2) {
        let position = usize::from(pair[0]) * 3 % image.len();
        image[position] = pair[1];
    }
    fuzz_container_open(&image);
}

/// Fuzz target for record decoding with field masks.
pub fn fuzz_record_decode(data: &[u8]) {
    let _ = from_cbor::<Hit>(data);

    let mut decoder = RecordDecoder::<Hit>::new();
    decoder.set_field_enabled("*", false);
    decoder.set_field_enabled("ch*", true);
    let _ = decoder.decode(data);
}

fn sample_image() -> Vec<u8> {
    let build = || -> rowchain_core::CoreResult<Vec<u8>> {
        let mut writer = ContainerWriter::create(InMemoryBackend::new(), FileHeader::new(1, 0))?;
        let slot =
            writer.declare_container(&Hit::container_name(), &Hit::field_name(), Hit::NAME)?;
        for channel in 0..3u32 {
            let bytes = rowchain_codec::to_cbor(&crate::fixtures::sample_hit(channel))?;
            writer.container(slot)?.append(&bytes)?;
        }
        writer.write_object("run-summary", "Summary", &[0xa0])?;
        Ok(writer.finish()?.data())
    };
    build().expect("Failed to build sample image")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::PropTestConfig;
    use proptest::prelude::*;

    #[test]
    fn sample_image_opens() {
        let image = sample_image();
        let file = ContainerFile::open(InMemoryBackend::read_only(image)).unwrap();
        assert_eq!(file.container("HitContainer").unwrap().len(), 3);
    }

    #[test]
    fn fixed_inputs() {
        fuzz_container_open(&[]);
        fuzz_container_open(b"RCHN");
        fuzz_container_open(&sample_image());
        fuzz_damaged_file(&[0, 0xFF, 5, 0x00, 200, 0x42]);
        fuzz_record_decode(&[0xa1, 0x61, 0x63, 0x01]);
    }

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn open_never_panics(data in prop::collection::vec(any::<u8>(), 0..512)) {
            fuzz_container_open(&data);
        }

        #[test]
        fn damage_never_panics(data in prop::collection::vec(any::<u8>(), 0..64)) {
            fuzz_damaged_file(&data);
        }

        #[test]
        fn decode_never_panics(data in prop::collection::vec(any::<u8>(), 0..128)) {
            fuzz_record_decode(&data);
        }
    }
}
