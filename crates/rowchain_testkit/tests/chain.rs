//! Integration tests for writing and reading record chains.

use proptest::prelude::*;
use rowchain_core::{is_valid, ChainReader, CoreError, ReaderOptions, RecordWriter, WriterOptions};
use rowchain_testkit::{
    chain_layout_strategy, corrupt_from_end, hits_strategy, init_test_logging, sample_hits,
    truncate_by, ChainHarness, Hit, PropTestConfig, Summary, TestDir, Track,
};
use std::path::PathBuf;

const CONTAINER: &str = "HitContainer";

fn write_and_read(hits: &[Hit]) -> Vec<Hit> {
    let dir = TestDir::new();
    let path = dir.path("roundtrip.rch");

    let mut writer = RecordWriter::<Hit>::open(&path).unwrap();
    writer.fill_all(hits).unwrap();
    writer.close().unwrap();

    let mut reader = ChainReader::<Hit>::open_file(&path).unwrap();
    reader.read_all().unwrap()
}

proptest! {
    #![proptest_config(PropTestConfig::quick().to_proptest_config())]

    #[test]
    fn roundtrip_preserves_order_and_length(hits in hits_strategy(64)) {
        prop_assert_eq!(write_and_read(&hits), hits);
    }

    #[test]
    fn chained_size_is_sum_of_files(layout in chain_layout_strategy(5, 12)) {
        let mut harness = ChainHarness::new();
        for hits in layout {
            harness.add_file(hits);
        }

        let mut reader = ChainReader::<Hit>::open(harness.paths()).unwrap();
        harness.verify(&mut reader);
    }
}

#[test]
fn size_counts_only_admitted_files() {
    init_test_logging();
    let mut harness = ChainHarness::new();
    harness.add_file(sample_hits(0..4));
    harness.add_corrupt_file();
    harness.add_file(Vec::new());
    harness.add_missing_file();
    harness.add_file(sample_hits(4..7));

    let mut reader = harness.open_checked().unwrap();
    assert_eq!(reader.len().unwrap(), 7);
    assert_eq!(reader.chain_files().unwrap().len(), harness.valid_count());
    harness.verify(&mut reader);
}

#[test]
fn two_valid_files_and_one_corrupt() {
    init_test_logging();
    let records_per_file = 3;
    let mut harness = ChainHarness::new();
    harness.add_file(sample_hits(0..records_per_file));
    harness.add_corrupt_file();
    harness.add_file(sample_hits(10..10 + records_per_file));

    let reader = harness.open_checked().unwrap();
    assert_eq!(reader.len().unwrap(), 2 * u64::from(records_per_file));
}

#[test]
fn repeated_access_hits_the_cache() {
    let dir = TestDir::new();
    let path = dir.write_hits("a.rch", &sample_hits(0..5));
    let mut reader = ChainReader::<Hit>::open_file(&path).unwrap();

    let first = reader.get(3).unwrap().clone();
    let decoded = reader.stats().entries_decoded;
    let second = reader.get(3).unwrap().clone();

    assert_eq!(first, second);
    assert_eq!(reader.stats().entries_decoded, decoded);
    assert_eq!(reader.stats().cache_hits, 1);
}

#[test]
fn out_of_range_access_fails() {
    let dir = TestDir::new();
    let path = dir.write_hits("a.rch", &sample_hits(0..5));
    let mut reader = ChainReader::<Hit>::open_file(&path).unwrap();

    for index in [5, 6, 1 << 40, u64::MAX] {
        match reader.get(index) {
            Err(CoreError::EntryOutOfRange { index: i, size }) => {
                assert_eq!(i, index);
                assert_eq!(size, 5);
            }
            other => panic!("expected EntryOutOfRange for {index}, got {other:?}"),
        }
    }
    assert_eq!(reader.get(4).unwrap(), &sample_hits(4..5)[0]);
}

#[test]
fn validity_checks() {
    let dir = TestDir::new();
    let good = dir.write_hits("good.rch", &sample_hits(0..2));
    let empty = dir.write_hits("empty.rch", &[]);
    let tracks = dir.write_tracks("tracks.rch", 3);
    let garbage = dir.write_garbage("garbage.rch");
    let missing = dir.path("missing.rch");

    assert!(is_valid(&good, CONTAINER, true, false));
    assert!(!is_valid(&missing, CONTAINER, false, true));
    assert!(!is_valid(&garbage, CONTAINER, false, true));
    assert!(!is_valid(&tracks, CONTAINER, false, true));
    assert!(!is_valid(&empty, CONTAINER, false, true));

    let damaged_directory = dir.write_hits("zombie.rch", &sample_hits(0..2));
    corrupt_from_end(&damaged_directory, 14);
    assert!(!is_valid(&damaged_directory, CONTAINER, false, true));
}

#[test]
fn recovered_files_are_rejected_on_request() {
    let dir = TestDir::new();
    let path = dir.write_hits("crashed.rch", &sample_hits(0..3));
    // drop the trailer, as if the writer died before finalizing
    truncate_by(&path, 12);

    assert!(is_valid(&path, CONTAINER, false, false));
    assert!(!is_valid(&path, CONTAINER, true, false));

    let lenient = ReaderOptions::new().check_validity(true);
    let strict = lenient.clone().skip_recovered(true);
    assert_eq!(
        ChainReader::<Hit>::open_with([&path], &lenient)
            .unwrap()
            .len()
            .unwrap(),
        3
    );
    assert_eq!(
        ChainReader::<Hit>::open_with([&path], &strict)
            .unwrap()
            .len()
            .unwrap(),
        0
    );
}

#[test]
fn cursors_of_different_readers_do_not_compare() {
    let dir = TestDir::new();
    let path = dir.write_hits("a.rch", &sample_hits(0..3));
    let a = ChainReader::<Hit>::open_file(&path).unwrap();
    let b = ChainReader::<Hit>::open_file(&path).unwrap();

    let pairs = [
        (a.begin().unwrap(), b.begin().unwrap()),
        (a.begin().unwrap(), b.end().unwrap()),
        (a.end().unwrap(), b.end().unwrap()),
    ];
    for (x, y) in pairs {
        assert!(matches!(x.try_ne(&y), Err(CoreError::CrossReaderIteratorMisuse)));
        assert!(matches!(x.try_eq(&y), Err(CoreError::CrossReaderIteratorMisuse)));
    }
}

#[test]
fn cursor_iteration_matches_read_all() {
    let dir = TestDir::new();
    let path = dir.write_hits("a.rch", &sample_hits(0..6));
    let mut reader = ChainReader::<Hit>::open_file(&path).unwrap();

    let mut collected = Vec::new();
    let mut it = reader.begin().unwrap();
    let end = reader.end().unwrap();
    while it.try_ne(&end).unwrap() {
        collected.push(reader.at(&it).unwrap().clone());
        it.advance();
    }
    assert_eq!(collected, reader.read_all().unwrap());

    let evens: Vec<u32> = {
        let mut channels = Vec::new();
        let mut it = reader.begin().unwrap();
        while it.index() < end.index() {
            channels.push(reader.at(&it).unwrap().channel);
            it.advance_by(2);
        }
        channels
    };
    assert_eq!(evens, vec![0, 2, 4]);
}

#[test]
fn close_twice_is_harmless() {
    let dir = TestDir::new();
    let path = dir.path("a.rch");

    let mut writer = RecordWriter::<Hit>::open(&path).unwrap();
    writer.fill_all(&sample_hits(0..2)).unwrap();
    writer.close().unwrap();
    let bytes = std::fs::read(&path).unwrap();
    writer.close().unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), bytes);
    assert!(!writer.is_open());

    let mut reader = ChainReader::<Hit>::open_file(&path).unwrap();
    reader.close();
    reader.close();
    assert!(!reader.is_open());
    assert!(matches!(reader.len(), Err(CoreError::NotOpen { .. })));
}

#[test]
fn summary_found_in_second_of_three_files() {
    let mut harness = ChainHarness::new();
    harness.add_file(sample_hits(0..2));
    harness.add_file_with_summary(sample_hits(2..4), "run-summary", Summary { run: 7, hits: 2 });
    harness.add_file(sample_hits(4..6));

    let mut reader = ChainReader::<Hit>::open(harness.paths()).unwrap();
    assert!(reader.has_object_named::<Summary>("run-summary").unwrap());
    assert!(!reader.has_object_named::<Summary>("missing").unwrap());
    assert_eq!(
        reader.object_named::<Summary>("run-summary").unwrap(),
        Summary { run: 7, hits: 2 }
    );

    assert!(matches!(
        reader.object_named::<Summary>("missing"),
        Err(CoreError::AuxObjectNotFound { .. })
    ));
}

#[test]
fn binding_mismatch_fails_open() {
    let dir = TestDir::new();
    let tracks = dir.write_tracks("tracks.rch", 2);

    let options = ReaderOptions::new().container_name("TrackContainer");
    let result = ChainReader::<Hit>::open_with([&tracks], &options);
    assert!(matches!(result, Err(CoreError::FieldBindingFailed { .. })));

    let options = options.field_name("Track");
    let result = ChainReader::<Hit>::open_with([&tracks], &options);
    assert!(matches!(result, Err(CoreError::FieldBindingFailed { .. })));
}

#[test]
fn rollover_output_reads_as_one_chain() {
    let dir = TestDir::new();
    let path = dir.path("run.rch");
    let hits = sample_hits(0..50);

    let mut writer =
        RecordWriter::<Hit>::open_with(&path, WriterOptions::new().max_output_size(512)).unwrap();
    writer.fill_all(&hits).unwrap();
    writer.write(&Summary { run: 1, hits: 50 }).unwrap();
    writer.close().unwrap();

    let outputs: Vec<PathBuf> = writer.output_paths().to_vec();
    assert!(outputs.len() > 2);
    assert_eq!(writer.records_written(), 50);
    for output in &outputs {
        assert!(is_valid(output, CONTAINER, true, false), "{} is not valid", output.display());
    }

    let mut reader = ChainReader::<Hit>::open(&outputs).unwrap();
    assert_eq!(reader.read_all().unwrap(), hits);
    assert_eq!(reader.object::<Summary>().unwrap().hits, 50);
}

#[test]
fn disabled_fields_are_not_read() {
    let dir = TestDir::new();
    let path = dir.write_hits("a.rch", &sample_hits(1..4));
    let mut reader = ChainReader::<Hit>::open_file(&path).unwrap();

    reader.set_field_enabled("*", false).unwrap();
    reader.set_field_enabled("ch*", true).unwrap();
    let hit = reader.get(1).unwrap();
    assert_eq!(hit.channel, 2);
    assert_eq!(hit.charge, 2.5);
    assert_eq!(hit.time_ns, 0);
    assert!(hit.tag.is_empty());
}

#[test]
fn empty_reader_reports_no_valid_files() {
    let dir = TestDir::new();
    let garbage = dir.write_garbage("garbage.rch");

    let options = ReaderOptions::new().check_validity(true);
    let mut reader = ChainReader::<Hit>::open_with([&garbage], &options).unwrap();
    assert_eq!(reader.len().unwrap(), 0);
    assert!(matches!(reader.get(0), Err(CoreError::NoValidFiles { .. })));
    assert!(matches!(
        reader.set_field_enabled("tag", false),
        Err(CoreError::NoValidFiles { .. })
    ));

    let strict = options.require_files(true);
    assert!(matches!(
        ChainReader::<Hit>::open_with([&garbage], &strict),
        Err(CoreError::NoValidFiles { .. })
    ));
}

#[test]
fn unchecked_bad_files_contribute_nothing() {
    let mut harness = ChainHarness::new();
    harness.add_file(sample_hits(0..2));
    harness.add_corrupt_file();
    harness.add_missing_file();
    harness.add_file(sample_hits(2..3));

    let mut reader = ChainReader::<Hit>::open(harness.paths()).unwrap();
    let files = reader.chain_files().unwrap();
    assert_eq!(files.len(), 4);
    assert_eq!(
        files.iter().map(|f| f.entries).collect::<Vec<_>>(),
        vec![2, 0, 0, 1]
    );
    harness.verify(&mut reader);
}
