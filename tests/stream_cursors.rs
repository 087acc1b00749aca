//! Cursor, seek, peek and push-back behavior of MmapStream.

use mmap_stream::{
    CursorTarget, MemoryMappedFile, MmapStream, MmapStreamError, SeekOrigin, StreamBuf,
};
use std::io::{Read, Seek, SeekFrom, Write};
use tempfile::{tempdir, TempDir};

fn write_stream(dir: &TempDir, name: &str) -> MmapStream {
    MmapStream::builder().create(dir.path().join(name)).expect("create")
}

#[test]
fn read_and_write_cursors_are_independent() {
    let dir = tempdir().expect("tempdir");
    let mut stream = write_stream(&dir, "independent.bin");
    stream.write_bytes(b"abcdefghij").expect("write");

    stream.seek(SeekOrigin::Start, 4, CursorTarget::Read).expect("seek read");
    assert_eq!(stream.read_position(), 4);
    assert_eq!(stream.write_position(), Some(10));

    stream.seek(SeekOrigin::Start, 2, CursorTarget::Write).expect("seek write");
    assert_eq!(stream.read_position(), 4);
    assert_eq!(stream.write_position(), Some(2));

    stream.seek(SeekOrigin::Start, 7, CursorTarget::Both).expect("seek both");
    assert_eq!(stream.read_position(), 7);
    assert_eq!(stream.write_position(), Some(7));
}

#[test]
fn seek_current_is_relative_to_the_targeted_cursor() {
    let dir = tempdir().expect("tempdir");
    let mut stream = write_stream(&dir, "relative.bin");
    stream.write_bytes(b"0123456789").expect("write");
    stream.seek(SeekOrigin::Start, 2, CursorTarget::Read).expect("seek read");

    assert_eq!(stream.seek(SeekOrigin::Current, -3, CursorTarget::Write).expect("write rel"), 7);
    assert_eq!(stream.seek(SeekOrigin::Current, 3, CursorTarget::Read).expect("read rel"), 5);
    // Both is measured from the read cursor.
    assert_eq!(stream.seek(SeekOrigin::Current, 1, CursorTarget::Both).expect("both rel"), 6);
    assert_eq!(stream.write_position(), Some(6));
}

#[test]
fn seek_end_counts_back_from_high_water_mark() {
    let dir = tempdir().expect("tempdir");
    let mut stream = write_stream(&dir, "end.bin");
    stream.write_bytes(b"0123456789").expect("write");
    assert!(stream.capacity() > 10);

    assert_eq!(stream.seek(SeekOrigin::End, 4, CursorTarget::Read).expect("seek"), 6);
    let mut buf = [0u8; 8];
    assert_eq!(stream.read_bytes(&mut buf).expect("read"), 4);
    assert_eq!(&buf[..4], b"6789");
}

#[test]
fn out_of_range_seeks_fail_without_moving() {
    let dir = tempdir().expect("tempdir");
    let mut stream = write_stream(&dir, "range.bin");
    stream.write_bytes(b"abc").expect("write");
    let capacity = stream.capacity();

    match stream.seek(SeekOrigin::Start, -1, CursorTarget::Read) {
        Err(MmapStreamError::SeekOutOfRange { offset, .. }) => assert_eq!(offset, -1),
        other => panic!("expected SeekOutOfRange, got {other:?}"),
    }
    assert!(matches!(
        stream.seek(SeekOrigin::End, 4, CursorTarget::Both),
        Err(MmapStreamError::SeekOutOfRange { .. })
    ));
    assert!(matches!(
        stream.seek(SeekOrigin::Start, i64::try_from(capacity).expect("fits") + 1, CursorTarget::Write),
        Err(MmapStreamError::SeekOutOfRange { .. })
    ));
    assert_eq!(stream.read_position(), 0);
    assert_eq!(stream.write_position(), Some(3));

    // The capacity itself is a valid position.
    let at_cap = stream
        .seek(SeekOrigin::Start, i64::try_from(capacity).expect("fits"), CursorTarget::Write)
        .expect("seek to capacity");
    assert_eq!(at_cap, capacity);
}

#[test]
fn seeking_the_write_cursor_does_not_raise_high_water_mark() {
    let dir = tempdir().expect("tempdir");
    let mut stream = write_stream(&dir, "hwm.bin");
    stream.write_bytes(b"abc").expect("write");
    stream.seek(SeekOrigin::Start, 100, CursorTarget::Write).expect("seek");
    assert_eq!(stream.high_water_mark(), 3);

    stream.write_byte(b'z').expect("write byte");
    assert_eq!(stream.high_water_mark(), 101);

    stream.seek(SeekOrigin::Start, 0, CursorTarget::Write).expect("rewind");
    stream.write_bytes(b"x").expect("overwrite");
    assert_eq!(stream.high_water_mark(), 101);
}

#[test]
fn high_water_mark_tracks_maximum_across_growth() {
    let dir = tempdir().expect("tempdir");
    let mut stream = write_stream(&dir, "monotonic.bin");
    let chunk = [0x5Au8; 3000];
    let mut max_put = 0;
    for round in 0..6 {
        stream.write_bytes(&chunk).expect("write chunk");
        max_put = max_put.max(stream.write_position().expect("write mode"));
        if round % 2 == 1 {
            stream.seek(SeekOrigin::Current, -2500, CursorTarget::Write).expect("step back");
        }
        assert_eq!(stream.high_water_mark(), max_put);
    }
}

#[test]
fn growth_preserves_existing_bytes() {
    let dir = tempdir().expect("tempdir");
    let region = MemoryMappedFile::create_rw(dir.path().join("grow.bin"), 4096).expect("create");
    let mut stream = MmapStream::new(region);

    let first: Vec<u8> = (0..4096u32).map(|i| (i * 7 % 256) as u8).collect();
    stream.write_bytes(&first).expect("fill first page");
    assert_eq!(stream.capacity(), 4096);

    stream.write_byte(0xEE).expect("overflow by one byte");
    assert!(stream.capacity() >= 8192);

    let mut back = vec![0u8; 4097];
    assert_eq!(stream.read_bytes(&mut back).expect("read"), 4097);
    assert_eq!(&back[..4096], &first[..]);
    assert_eq!(back[4096], 0xEE);
}

#[test]
fn peek_does_not_consume() {
    let dir = tempdir().expect("tempdir");
    let mut stream = write_stream(&dir, "peek.bin");
    stream.write_bytes(b"xy").expect("write");

    assert_eq!(stream.peek_byte().expect("peek"), Some(b'x'));
    assert_eq!(stream.peek_byte().expect("peek again"), Some(b'x'));
    assert_eq!(stream.next_byte().expect("next"), Some(b'x'));
    assert_eq!(stream.next_byte().expect("next"), Some(b'y'));
    assert_eq!(stream.peek_byte().expect("peek at end"), None);
    assert_eq!(stream.next_byte().expect("next at end"), None);
    assert_eq!(stream.available(), 0);
}

#[test]
fn push_back_of_same_byte_restores_position() {
    let dir = tempdir().expect("tempdir");
    let mut stream = write_stream(&dir, "pushback_same.bin");
    stream.write_bytes(b"abc").expect("write");

    assert_eq!(stream.push_back(b'a').expect("push back at start"), None);

    let b = stream.next_byte().expect("next").expect("byte");
    assert_eq!(stream.read_position(), 1);
    assert_eq!(stream.push_back(b).expect("push back"), Some(b'a'));
    assert_eq!(stream.read_position(), 0);

    let mut all = [0u8; 3];
    stream.read_bytes(&mut all).expect("read");
    assert_eq!(&all, b"abc");
}

#[test]
fn push_back_of_different_byte_overwrites() {
    let dir = tempdir().expect("tempdir");
    let mut stream = write_stream(&dir, "pushback_diff.bin");
    stream.write_bytes(b"abc").expect("write");
    stream.seek(SeekOrigin::Start, 2, CursorTarget::Read).expect("seek");

    assert_eq!(stream.push_back(b'Q').expect("push back"), Some(b'Q'));
    assert_eq!(stream.read_position(), 1);
    assert_eq!(stream.high_water_mark(), 3);

    let mut rest = [0u8; 2];
    stream.read_bytes(&mut rest).expect("read");
    assert_eq!(&rest, b"Qc");
}

#[test]
fn push_back_on_read_stream_cannot_mutate() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("pushback_ro.bin");
    std::fs::write(&path, b"abc").expect("seed");
    let mut stream = MmapStream::builder().open_read(&path).expect("open");

    assert_eq!(stream.next_byte().expect("next"), Some(b'a'));
    assert!(matches!(stream.push_back(b'z'), Err(MmapStreamError::InvalidMode(_))));
    assert_eq!(stream.read_position(), 1);
    assert_eq!(stream.push_back(b'a').expect("same byte"), Some(b'a'));
    assert_eq!(stream.read_position(), 0);
}

#[test]
fn push_back_past_end_of_data_writes_nothing() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("pushback_past_end.bin");
    let mut stream = MmapStream::builder().create(&path).expect("create");
    stream.write_bytes(b"abc").expect("write");

    stream.seek(SeekOrigin::Start, 50, CursorTarget::Read).expect("seek past data");
    assert_eq!(stream.push_back(b'Z').expect("push back past end"), None);
    assert_eq!(stream.read_position(), 49);
    assert_eq!(stream.peek_byte().expect("peek"), None);
    assert_eq!(stream.high_water_mark(), 3);

    stream.seek(SeekOrigin::Start, 3, CursorTarget::Read).expect("seek to end");
    assert_eq!(stream.push_back(b'Z').expect("push back last byte"), Some(b'Z'));
    assert_eq!(stream.peek_byte().expect("peek"), Some(b'Z'));

    stream.close().expect("close");
    assert_eq!(std::fs::read(&path).expect("read"), b"abZ");
}

#[test]
fn reads_stop_at_high_water_mark_not_capacity() {
    let dir = tempdir().expect("tempdir");
    let mut stream = write_stream(&dir, "eos.bin");
    stream.write_bytes(b"12345").expect("write");

    let mut buf = vec![0u8; 64];
    assert_eq!(stream.read_bytes(&mut buf).expect("read"), 5);
    assert_eq!(stream.read_bytes(&mut buf).expect("read at end"), 0);

    // A read cursor parked past the data is still end of stream.
    stream.seek(SeekOrigin::Start, 100, CursorTarget::Read).expect("seek past data");
    assert_eq!(stream.read_bytes(&mut buf).expect("read past data"), 0);
    assert_eq!(stream.peek_byte().expect("peek"), None);
    assert_eq!(stream.available(), 0);
}

#[test]
fn empty_write_is_a_no_op() {
    let dir = tempdir().expect("tempdir");
    let mut stream = write_stream(&dir, "empty.bin");
    let capacity = stream.capacity();
    stream
        .seek(SeekOrigin::Start, i64::try_from(capacity).expect("fits"), CursorTarget::Write)
        .expect("seek to end of mapping");

    assert_eq!(stream.write_bytes(&[]).expect("empty write"), 0);
    assert_eq!(stream.capacity(), capacity);
    assert_eq!(stream.high_water_mark(), 0);
}

#[test]
fn std_io_traits_round_trip() {
    let dir = tempdir().expect("tempdir");
    let mut stream = write_stream(&dir, "std.bin");

    stream.write_all(b"line one\nline two\n").expect("write_all");
    Write::flush(&mut stream).expect("flush");
    assert_eq!(Seek::seek(&mut stream, SeekFrom::End(-9)).expect("seek end"), 9);
    assert_eq!(stream.write_position(), Some(9));

    let mut tail = String::new();
    stream.read_to_string(&mut tail).expect("read_to_string");
    assert_eq!(tail, "line two\n");

    stream.rewind().expect("rewind");
    assert_eq!(stream.stream_position().expect("position"), 0);
    assert!(Seek::seek(&mut stream, SeekFrom::Current(-1)).is_err());
}

fn copy_through<S: StreamBuf>(stream: &mut S, payload: &[u8]) -> Vec<u8> {
    stream.write_bytes(payload).expect("write");
    stream.seek(SeekOrigin::Start, 0, CursorTarget::Read).expect("rewind");
    let mut out = vec![0u8; payload.len()];
    let n = stream.read_bytes(&mut out).expect("read");
    out.truncate(n);
    out
}

#[test]
fn stream_buf_trait_drives_the_stream() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("trait.bin");
    let mut stream = MmapStream::builder().create(&path).expect("create");

    assert_eq!(copy_through(&mut stream, b"generic"), b"generic");
    StreamBuf::flush(&mut stream).expect("flush");
    StreamBuf::close(stream).expect("close");
    assert_eq!(std::fs::read(&path).expect("read"), b"generic");
}

#[test]
fn shared_region_sees_growth_from_other_stream() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("shared.bin");
    let region = MemoryMappedFile::create_rw(&path, 4096).expect("create");

    let mut writer = MmapStream::new(region.clone());
    writer.write_bytes(&vec![1u8; 10_000]).expect("grow");
    assert_eq!(region.len(), writer.capacity());

    let mut tail = [0u8; 4];
    region.read_into(9_996, &mut tail).expect("read via shared handle");
    assert_eq!(tail, [1u8; 4]);

    writer.close().expect("close");
    assert_eq!(region.len(), 10_000);
}
