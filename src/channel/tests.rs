use super::counters::{set_write_chunk_limit, write_syscall_count};
use super::fd::{above_stdio, pipe_cloexec};
use super::*;
use std::fs::File;
use std::io::{Read, Write};
use std::os::fd::OwnedFd;
use std::thread;
use std::time::{Duration, Instant};

fn pipe_pair() -> (OwnedFd, OwnedFd) {
    pipe_cloexec().expect("pipe")
}

fn reader_with_raw_peer(max_line_bytes: usize) -> (LineReader, File) {
    let (read, write) = pipe_pair();
    let reader = LineReader::new(read, max_line_bytes).expect("reader");
    (reader, File::from(write))
}

#[test]
fn read_line_returns_complete_line_and_keeps_partial_tail() {
    let (mut reader, mut peer) = reader_with_raw_peer(1024);
    peer.write_all(b"show\ncont").unwrap();

    let first = reader.read_line(Some(Duration::from_millis(200))).unwrap();
    assert_eq!(first.as_deref(), Some("show"));
    assert_eq!(reader.read_line(None).unwrap(), None);
    assert_eq!(reader.buffered_len(), 4);

    peer.write_all(b"rol\n").unwrap();
    let second = reader.read_line(Some(Duration::from_millis(200))).unwrap();
    assert_eq!(second.as_deref(), Some("control"));
    assert_eq!(reader.buffered_len(), 0);
}

#[test]
fn read_line_with_zero_timeout_does_not_block() {
    let (mut reader, _peer) = reader_with_raw_peer(1024);
    let start = Instant::now();
    assert_eq!(reader.read_line(Some(Duration::ZERO)).unwrap(), None);
    assert!(start.elapsed() < Duration::from_millis(50));
}

#[test]
fn read_line_times_out_when_peer_stays_silent() {
    let (mut reader, _peer) = reader_with_raw_peer(1024);
    let start = Instant::now();
    let result = reader.read_line(Some(Duration::from_millis(60))).unwrap();
    let elapsed = start.elapsed();
    assert_eq!(result, None);
    assert!(elapsed >= Duration::from_millis(55), "returned early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1_000), "overran: {elapsed:?}");
    assert!(reader.is_open());
}

#[test]
fn read_line_waits_for_late_data() {
    let (mut reader, mut peer) = reader_with_raw_peer(1024);
    let writer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        peer.write_all(b"hide\n").unwrap();
        peer
    });
    let line = reader.read_line(Some(Duration::from_secs(2))).unwrap();
    assert_eq!(line.as_deref(), Some("hide"));
    drop(writer.join().unwrap());
}

#[test]
fn peer_close_mid_line_reports_closed() {
    let (mut reader, mut peer) = reader_with_raw_peer(1024);
    peer.write_all(b"half a li").unwrap();
    drop(peer);

    let err = reader
        .read_line(Some(Duration::from_millis(200)))
        .unwrap_err();
    assert!(err.is_closed());
    assert!(!reader.is_open());
    assert!(reader.read_line(None).unwrap_err().is_closed());
}

#[test]
fn buffered_lines_are_delivered_before_close() {
    let (mut reader, mut peer) = reader_with_raw_peer(1024);
    peer.write_all(b"size\n800\n600\n").unwrap();
    drop(peer);

    let mut lines = Vec::new();
    loop {
        match reader.read_line(Some(Duration::from_millis(200))) {
            Ok(Some(line)) => lines.push(line),
            Ok(None) => panic!("unexpected timeout"),
            Err(err) => {
                assert!(err.is_closed());
                break;
            }
        }
    }
    assert_eq!(lines, vec!["size", "800", "600"]);
}

#[test]
fn oversized_unterminated_input_closes_reader() {
    let (mut reader, mut peer) = reader_with_raw_peer(64);
    peer.write_all(&[b'x'; 200]).unwrap();

    let err = reader
        .read_line(Some(Duration::from_millis(200)))
        .unwrap_err();
    assert!(err.is_closed());
    assert!(!reader.is_open());
}

#[test]
fn long_terminated_line_within_limit_is_accepted() {
    let (mut reader, mut peer) = reader_with_raw_peer(16 * 1024);
    let payload = "a".repeat(10_000);
    let writer = thread::spawn(move || {
        peer.write_all(payload.as_bytes()).unwrap();
        peer.write_all(b"\n").unwrap();
    });
    let line = reader.read_line(Some(Duration::from_secs(2))).unwrap();
    assert_eq!(line.map(|line| line.len()), Some(10_000));
    writer.join().unwrap();
}

#[test]
fn write_line_rejects_embedded_terminator() {
    let (_read, write) = pipe_pair();
    let mut writer = LineWriter::new(write, Duration::from_millis(100)).unwrap();
    let err = writer.write_line("two\nlines").unwrap_err();
    assert!(matches!(err, ChannelError::EmbeddedTerminator));
    assert!(writer.is_open());
}

#[test]
fn write_line_appends_terminator() {
    let (read, write) = pipe_pair();
    let mut writer = LineWriter::new(write, Duration::from_millis(100)).unwrap();
    writer.write_line("focus").unwrap();
    drop(writer);

    let mut out = String::new();
    File::from(read).read_to_string(&mut out).unwrap();
    assert_eq!(out, "focus\n");
}

#[test]
fn short_writes_are_retried_until_complete() {
    let (read, write) = pipe_pair();
    let mut writer = LineWriter::new(write, Duration::from_millis(100)).unwrap();
    set_write_chunk_limit(Some(3));
    writer.write_line("control").unwrap();
    let syscalls = write_syscall_count();
    set_write_chunk_limit(None);
    drop(writer);

    assert_eq!(syscalls, 3);
    let mut out = String::new();
    File::from(read).read_to_string(&mut out).unwrap();
    assert_eq!(out, "control\n");
}

#[test]
fn write_to_closed_reader_reports_closed_and_stays_closed() {
    let (read, write) = pipe_pair();
    drop(read);
    let mut writer = LineWriter::new(write, Duration::from_millis(100)).unwrap();

    assert!(writer.write_line("show").unwrap_err().is_closed());
    assert!(!writer.is_open());
    assert!(writer.write_line("hide").unwrap_err().is_closed());
}

#[test]
fn stalled_peer_hits_write_timeout() {
    let (_read, write) = pipe_pair();
    let mut writer = LineWriter::new(write, Duration::from_millis(50)).unwrap();
    let block = vec![b'z'; 4 * 1024 * 1024];

    let start = Instant::now();
    let err = writer.write_all(&block).unwrap_err();
    assert!(err.is_closed());
    assert!(start.elapsed() < Duration::from_secs(2));
    assert!(!writer.is_open());
}

#[test]
fn line_channel_round_trips_between_two_ends() {
    let (host_recv, child_send) = pipe_pair();
    let (child_recv, host_send) = pipe_pair();
    let options = ChannelOptions::default();
    let mut host = LineChannel::from_fds(host_recv, host_send, &options).unwrap();
    let mut child = LineChannel::from_fds(child_recv, child_send, &options).unwrap();

    host.write_line("show").unwrap();
    let got = child.read_line(Some(Duration::from_millis(200))).unwrap();
    assert_eq!(got.as_deref(), Some("show"));

    child.write_line("").unwrap();
    let got = host.read_line(Some(Duration::from_millis(200))).unwrap();
    assert_eq!(got.as_deref(), Some(""));

    assert!(host.is_running());
    host.close();
    assert!(!host.is_running());
}

#[test]
fn above_stdio_keeps_descriptors_already_out_of_range() {
    use std::os::fd::AsRawFd;
    let (read, _write) = pipe_pair();
    let raw = read.as_raw_fd();
    assert!(raw > 2);
    assert_eq!(above_stdio(read).unwrap().as_raw_fd(), raw);
}
