//! Delimited-stream framing tests.

use std::io::Cursor;

use cramberry::delimited::{
    messages, messages_with_options, read_delimited, write_delimited, write_delimited_with_options,
};
use cramberry::{ErrorKind, Limits, Options, Record};

#[derive(Debug, Clone, PartialEq, Default, Record)]
struct Event {
    #[cram(field = 1)]
    sequence: u64,
    #[cram(field = 2)]
    payload: String,
}

fn sample(sequence: u64) -> Event {
    Event {
        sequence,
        payload: format!("event-{sequence}"),
    }
}

#[test]
fn test_single_message_roundtrip() {
    let mut stream = Vec::new();
    write_delimited(&mut stream, &sample(1)).unwrap();

    // Header is the body length; body is the plain encoding.
    let body = cramberry::marshal(&sample(1)).unwrap();
    assert_eq!(stream[0] as usize, body.len());
    assert_eq!(&stream[1..], &body[..]);

    let mut decoded = Event::default();
    read_delimited(Cursor::new(&stream), &mut decoded).unwrap();
    assert_eq!(decoded, sample(1));
}

#[test]
fn test_message_iterator() {
    let mut stream = Vec::new();
    for sequence in 0..5 {
        write_delimited(&mut stream, &sample(sequence)).unwrap();
    }

    let decoded: Result<Vec<Event>, _> = messages(Cursor::new(&stream)).collect();
    let decoded = decoded.unwrap();
    assert_eq!(decoded.len(), 5);
    for (index, event) in decoded.iter().enumerate() {
        assert_eq!(event, &sample(index as u64));
    }
}

#[test]
fn test_empty_stream_yields_nothing() {
    let mut iter = messages::<_, Event>(Cursor::new(Vec::new()));
    assert!(iter.next().is_none());
}

#[test]
fn test_truncated_body_is_error() {
    let mut stream = Vec::new();
    write_delimited(&mut stream, &sample(9)).unwrap();
    stream.truncate(stream.len() - 2);

    let mut decoded = Event::default();
    let err = read_delimited(Cursor::new(&stream), &mut decoded).unwrap_err();
    assert!(err.is(ErrorKind::Io));
}

#[test]
fn test_truncated_header_is_error() {
    // A multi-byte length varint cut mid-way.
    let stream = vec![0x80u8];
    let mut decoded = Event::default();
    let err = read_delimited(Cursor::new(&stream), &mut decoded).unwrap_err();
    assert!(err.is(ErrorKind::UnexpectedEof));
}

#[test]
fn test_frame_cap_enforced() {
    let opts = Options {
        limits: Limits {
            max_message_size: 8,
            ..Limits::default()
        },
        ..Options::default()
    };
    let mut stream = Vec::new();
    write_delimited(&mut stream, &sample(3)).unwrap();

    let mut iter = messages_with_options::<_, Event>(Cursor::new(&stream), opts);
    let err = iter.next().unwrap().unwrap_err();
    assert!(err.is(ErrorKind::MaxSizeExceeded));
    // The iterator fuses after an error.
    assert!(iter.next().is_none());
}

#[test]
fn test_error_mid_stream_fuses_iterator() {
    let mut stream = Vec::new();
    write_delimited(&mut stream, &sample(0)).unwrap();
    // A frame whose body is garbage.
    stream.push(2);
    stream.push(0xFF);
    stream.push(0xFF);
    write_delimited(&mut stream, &sample(1)).unwrap();

    let mut iter = messages::<_, Event>(Cursor::new(&stream));
    assert_eq!(iter.next().unwrap().unwrap(), sample(0));
    assert!(iter.next().unwrap().is_err());
    assert!(iter.next().is_none());
}

#[test]
fn test_options_passthrough() {
    let opts = Options::default();
    let mut stream = Vec::new();
    write_delimited_with_options(&mut stream, &sample(4), &opts).unwrap();
    let mut decoded = Event::default();
    read_delimited(Cursor::new(&stream), &mut decoded).unwrap();
    assert_eq!(decoded, sample(4));
}
