//! Integration tests for parsefuse.
//!
//! Dumps are built with the crate's own framing helpers and fed through the
//! full dissector.

use std::io::{self, Read};

use base64::{prelude::BASE64_STANDARD, Engine};
use bytes::Bytes;
use parsefuse::codec::{record_size, Value};
use parsefuse::protocol::{
    build_message_v1, build_message_v2, build_request, build_response, ByteOrder, Direction,
    DumpFormat, Header, InHeader, Meta, OutHeader, Timestamp,
};
use parsefuse::render::{renderer, OutputFormat};
use parsefuse::{abi, dissect_all, Dissector, DissectorConfig, ParsefuseError, Record};

const ORDER: ByteOrder = ByteOrder::Little;

/// Reader handing out at most `chunk` bytes per call.
struct ChunkedReader<'a> {
    data: &'a [u8],
    chunk: usize,
}

impl Read for ChunkedReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.chunk.min(buf.len()).min(self.data.len());
        buf[..n].copy_from_slice(&self.data[..n]);
        self.data = &self.data[n..];
        Ok(n)
    }
}

/// Deterministic pseudo-random sequence (64-bit LCG).
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }
}

fn request(opcode: u32, unique: u64, body: &[u8]) -> Vec<u8> {
    build_request(&InHeader::new(opcode, unique, 1, body.len()), body, ORDER)
}

fn reply(unique: u64, error: i32, body: &[u8]) -> Vec<u8> {
    build_response(&OutHeader::new(unique, error, body.len()), body, ORDER)
}

fn v1(direction: Direction, message: &[u8]) -> Vec<u8> {
    build_message_v1(direction, message)
}

fn config(format: DumpFormat) -> DissectorConfig {
    DissectorConfig {
        byte_order: ORDER,
        dump_format: format,
        ..DissectorConfig::default()
    }
}

fn dissect_v1(dump: &[u8]) -> Vec<Record> {
    dissect_all(dump, config(DumpFormat::V1)).unwrap()
}

fn write_in(size: u32) -> Vec<u8> {
    let mut body = vec![0u8; abi::layout::WRITE_IN.size()];
    body[16..20].copy_from_slice(&size.to_le_bytes());
    body
}

fn getxattr_in(size: u32, name: &[u8]) -> Vec<u8> {
    let mut body = size.to_le_bytes().to_vec();
    body.extend_from_slice(&[0; 4]);
    body.extend_from_slice(name);
    body
}

/// WRITE requests of pseudo-random sizes, some far beyond the initial buffer,
/// come back with their data intact.
#[test]
fn test_round_trip_varied_lengths() {
    let mut rng = Lcg(42);
    let mut dump = Vec::new();
    let mut expected = Vec::new();

    for unique in 1..=40u64 {
        let len = match unique % 4 {
            0 => (rng.next() % 200_000) as usize,
            _ => (rng.next() % 3000) as usize,
        };
        let data: Vec<u8> = (0..len).map(|i| (i as u64 ^ unique) as u8).collect();
        let mut body = write_in(len as u32);
        body.extend_from_slice(&data);

        let ts = Timestamp {
            secs: 1_600_000_000 + unique,
            nanos: unique as u32,
        };
        dump.extend(build_message_v2(
            Direction::Request,
            &[Meta::Timestamp(ts)],
            &request(abi::WRITE, unique, &body),
            ORDER,
        ));
        expected.push((unique, ts, data));
    }

    let config = DissectorConfig {
        buffer_capacity: 4096,
        ..config(DumpFormat::V2)
    };
    let records = dissect_all(dump.as_slice(), config).unwrap();
    assert_eq!(records.len(), expected.len());

    for (record, (unique, ts, data)) in records.iter().zip(&expected) {
        assert_eq!(record.unique(), *unique);
        assert_eq!(record.meta, vec![Meta::Timestamp(*ts)]);
        assert_eq!(record.opname.as_deref(), Some("WRITE"));
        if data.is_empty() {
            assert_eq!(record.body.len(), 1);
        } else {
            assert_eq!(record.body[1], Value::Bytes(Bytes::copy_from_slice(data)));
        }
    }
}

/// Decoding a byte-at-a-time source gives the same records as a whole slice.
#[test]
fn test_byte_at_a_time_matches_whole() {
    let mut dump = Vec::new();
    let mut entry = vec![0u8; abi::layout::ENTRY_OUT.size()];
    entry[0] = 2;
    for unique in 1..=5u64 {
        dump.extend(build_message_v2(
            Direction::Request,
            &[
                Meta::Timestamp(Timestamp { secs: unique, nanos: 0 }),
                Meta::Blob(Bytes::from_static(b"aux")),
            ],
            &request(abi::LOOKUP, unique, b"entry\0"),
            ORDER,
        ));
        dump.extend(build_message_v2(
            Direction::Response,
            &[],
            &reply(unique, 0, &entry),
            ORDER,
        ));
    }

    let whole = dissect_all(dump.as_slice(), config(DumpFormat::V2)).unwrap();
    let trickled = dissect_all(
        ChunkedReader {
            data: &dump,
            chunk: 1,
        },
        config(DumpFormat::V2),
    )
    .unwrap();

    assert_eq!(whole.len(), 10);
    assert_eq!(whole, trickled);
    assert_eq!(
        whole[0].meta[1],
        Meta::Blob(Bytes::from_static(b"aux"))
    );
}

#[test]
fn test_empty_source() {
    assert!(dissect_v1(&[]).is_empty());
    assert!(dissect_all(io::empty(), config(DumpFormat::V2))
        .unwrap()
        .is_empty());
}

#[test]
fn test_truncated_dump_is_short_read() {
    let mut dump = v1(Direction::Request, &request(abi::GETATTR, 1, &[0; 16]));
    let second = v1(Direction::Request, &request(abi::GETATTR, 2, &[0; 16]));
    dump.extend_from_slice(&second[..30]);

    let mut dissector = Dissector::new(dump.as_slice(), config(DumpFormat::V1));
    assert!(dissector.next_record().unwrap().is_some());
    let err = dissector.next_record().unwrap_err();
    assert!(matches!(err, ParsefuseError::ShortRead { offset: 57 }));
}

/// A reply consumes its pending entry; a second reply with the same id is
/// an orphan.
#[test]
fn test_correlation_lifecycle() {
    let mut dump = v1(Direction::Request, &request(abi::OPEN, 10, &[0; 8]));
    let mut open_out = vec![0u8; abi::layout::OPEN_OUT.size()];
    open_out[0] = 0x33;
    dump.extend(v1(Direction::Response, &reply(10, 0, &open_out)));
    dump.extend(v1(Direction::Response, &reply(10, 0, &open_out)));

    let records = dissect_v1(&dump);
    assert_eq!(records.len(), 3);

    assert_eq!(records[1].opcode, Some(abi::OPEN));
    let decoded = records[1].body[0].as_struct().unwrap();
    assert_eq!(decoded.name, "OpenOut");
    assert_eq!(decoded.unsigned("Fh"), Some(0x33));

    assert!(records[2].is_orphan());
    assert_eq!(records[2].body, vec![Value::Bytes(Bytes::from(open_out))]);
}

#[test]
fn test_getxattr_size_query_and_fetch() {
    let mut dump = Vec::new();
    // Size query: the reply is a getxattr_out.
    dump.extend(v1(
        Direction::Request,
        &request(abi::GETXATTR, 1, &getxattr_in(0, b"user.k\0")),
    ));
    dump.extend(v1(Direction::Response, &reply(1, 0, &[5, 0, 0, 0, 0, 0, 0, 0])));
    // Fetch: the reply is the value, even when it happens to be 8 bytes.
    dump.extend(v1(
        Direction::Request,
        &request(abi::GETXATTR, 2, &getxattr_in(64, b"user.k\0")),
    ));
    dump.extend(v1(Direction::Response, &reply(2, 0, b"12345678")));
    // Size query answered with an error: nothing to decode.
    dump.extend(v1(
        Direction::Request,
        &request(abi::GETXATTR, 3, &getxattr_in(0, b"user.none\0")),
    ));
    dump.extend(v1(Direction::Response, &reply(3, -61, &[])));

    let records = dissect_v1(&dump);
    assert_eq!(records.len(), 6);

    assert_eq!(records[0].body[1], Value::Text(Bytes::from_static(b"user.k")));

    let size = records[1].body[0].as_struct().unwrap();
    assert_eq!(size.name, "GetxattrOut");
    assert_eq!(size.unsigned("Size"), Some(5));

    assert_eq!(
        records[3].body,
        vec![Value::Bytes(Bytes::from_static(b"12345678"))]
    );
    assert!(records[5].body.is_empty());
}

#[test]
fn test_listxattr_both_shapes() {
    let mut dump = Vec::new();
    dump.extend(v1(Direction::Request, &request(abi::LISTXATTR, 1, &getxattr_in(0, b""))));
    dump.extend(v1(Direction::Response, &reply(1, 0, &[17, 0, 0, 0, 0, 0, 0, 0])));
    dump.extend(v1(Direction::Request, &request(abi::LISTXATTR, 2, &getxattr_in(17, b""))));
    dump.extend(v1(Direction::Response, &reply(2, 0, b"user.a\0user.bcde\0")));

    let records = dissect_v1(&dump);

    assert_eq!(records[1].body[0].as_struct().unwrap().unsigned("Size"), Some(17));
    assert_eq!(
        records[3].body,
        vec![Value::List(vec![
            Value::Text(Bytes::from_static(b"user.a")),
            Value::Text(Bytes::from_static(b"user.bcde")),
        ])]
    );
}

#[test]
fn test_forgets_create_no_pending_entry() {
    let mut batch = Vec::new();
    batch.extend_from_slice(&2u32.to_le_bytes());
    batch.extend_from_slice(&0u32.to_le_bytes());
    for (nodeid, nlookup) in [(3u64, 1u64), (4, 2)] {
        batch.extend_from_slice(&nodeid.to_le_bytes());
        batch.extend_from_slice(&nlookup.to_le_bytes());
    }

    let mut dump = v1(Direction::Request, &request(abi::FORGET, 1, &7u64.to_le_bytes()));
    dump.extend(v1(Direction::Request, &request(abi::BATCH_FORGET, 2, &batch)));
    // A stray reply with a forget's id stays unmatched.
    dump.extend(v1(Direction::Response, &reply(1, 0, &[])));

    let mut dissector = Dissector::new(dump.as_slice(), config(DumpFormat::V1));
    let forget = dissector.next_record().unwrap().unwrap();
    assert_eq!(forget.opname.as_deref(), Some("FORGET"));
    let batch = dissector.next_record().unwrap().unwrap();
    match &batch.body[1] {
        Value::List(entries) => assert_eq!(entries.len(), 2),
        other => panic!("unexpected {other:?}"),
    }
    assert!(dissector.pending().is_empty());

    let stray = dissector.next_record().unwrap().unwrap();
    assert!(stray.is_orphan());
}

#[test]
fn test_batch_forget_overflow_is_fatal() {
    let mut batch = Vec::new();
    batch.extend_from_slice(&5u32.to_le_bytes());
    batch.extend_from_slice(&[0; 4 + 16]);
    let dump = v1(Direction::Request, &request(abi::BATCH_FORGET, 1, &batch));

    let err = dissect_all(dump.as_slice(), config(DumpFormat::V1)).unwrap_err();
    assert!(matches!(err, ParsefuseError::Structural(_)));
}

fn dirent(ino: u64, name: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&ino.to_le_bytes());
    buf.extend_from_slice(&ino.to_le_bytes());
    buf.extend_from_slice(&(name.len() as u32).to_le_bytes());
    buf.extend_from_slice(&4u32.to_le_bytes());
    buf.extend_from_slice(name);
    buf.resize(record_size(name.len()), 0);
    buf
}

#[test]
fn test_readdir_reply() {
    let mut listing = dirent(1, b".");
    listing.extend(dirent(1, b".."));
    listing.extend(dirent(7, b"hello"));
    listing.extend_from_slice(&[0xEE; 9]);

    let mut dump = v1(Direction::Request, &request(abi::READDIR, 4, &[0; 40]));
    dump.extend(v1(Direction::Response, &reply(4, 0, &listing)));

    let records = dissect_v1(&dump);
    let body = &records[1].body;
    assert_eq!(body.len(), 2);
    match &body[0] {
        Value::List(entries) => {
            assert_eq!(entries.len(), 3);
            assert_eq!(entries[2].to_string().split(' ').last(), Some("hello]"));
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(body[1], Value::Bytes(Bytes::from_static(&[0xEE; 9])));
}

#[test]
fn test_readdirplus_reply() {
    let mut record = vec![0u8; abi::layout::ENTRY_OUT.size()];
    record[0] = 12;
    record.extend(dirent(12, b"file.txt"));

    let mut dump = v1(Direction::Request, &request(abi::READDIRPLUS, 5, &[0; 40]));
    dump.extend(v1(Direction::Response, &reply(5, 0, &record)));

    let records = dissect_v1(&dump);
    let Value::List(entries) = &records[1].body[0] else {
        panic!("expected entry list");
    };
    let Value::List(parts) = &entries[0] else {
        panic!("expected entry parts");
    };
    assert_eq!(parts.len(), 3);
    assert_eq!(parts[0].as_struct().unwrap().unsigned("Nodeid"), Some(12));
    assert_eq!(parts[2], Value::Text(Bytes::from_static(b"file.txt")));
}

/// Count 15 reads 14 metadata items and the payload; a leading field of 16
/// is a message length.
#[test]
fn test_v2_count_boundary() {
    let meta: Vec<Meta> = (0..14)
        .map(|i| Meta::Blob(Bytes::from(vec![i as u8; i + 1])))
        .collect();
    let mut dump = build_message_v2(
        Direction::Request,
        &meta,
        &request(abi::STATFS, 1, &[]),
        ORDER,
    );
    // A bare out header is exactly 16 bytes: format 1 framing inside format 2.
    dump.extend(v1(Direction::Response, &reply(1, -5, &[])));

    let records = dissect_all(dump.as_slice(), config(DumpFormat::V2)).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].meta.len(), 14);
    assert_eq!(records[0].meta[13], Meta::Blob(Bytes::from(vec![13u8; 14])));
    assert!(records[1].meta.is_empty());
    assert_eq!(records[1].header, Header::Out(OutHeader::new(1, -5, 0)));
    assert_eq!(records[1].opcode, Some(abi::STATFS));
}

#[test]
fn test_big_endian_dump() {
    let order = ByteOrder::Big;
    let mut body = Vec::new();
    order.put_u32(&mut body, 0o755);
    order.put_u32(&mut body, 0o022);
    body.extend_from_slice(b"newdir\0\0\0\0\0\0\0");
    let message = build_request(&InHeader::new(abi::MKDIR, 3, 1, body.len()), &body, order);
    let dump = build_message_v2(
        Direction::Request,
        &[Meta::Timestamp(Timestamp { secs: 1, nanos: 2 })],
        &message,
        order,
    );

    let config = DissectorConfig {
        byte_order: order,
        ..DissectorConfig::default()
    };
    let records = dissect_all(dump.as_slice(), config).unwrap();
    assert_eq!(records[0].opname.as_deref(), Some("MKDIR"));
    let mkdir = records[0].body[0].as_struct().unwrap();
    assert_eq!(mkdir.unsigned("Mode"), Some(0o755));
    assert_eq!(records[0].body[1], Value::Text(Bytes::from_static(b"newdir")));
    // Padding after the name is kept.
    assert_eq!(records[0].body[2], Value::Bytes(Bytes::from_static(&[0; 6])));
}

#[test]
fn test_unknown_direction_is_fatal() {
    let mut dump = v1(Direction::Request, &request(abi::GETATTR, 1, &[0; 16]));
    dump[0] = b'X';
    let err = dissect_all(dump.as_slice(), config(DumpFormat::V1)).unwrap_err();
    assert!(matches!(err, ParsefuseError::UnknownDirection { tag: 'X', offset: 0 }));
}

#[test]
fn test_json_renderer_end_to_end() {
    let mut dump = v1(Direction::Request, &request(abi::READ, 6, &[0; 40]));
    dump.extend(v1(Direction::Response, &reply(6, 0, &[b'z'; 600])));

    let mut out = Vec::new();
    {
        let mut render = renderer(OutputFormat::Json, &mut out, 512);
        for record in Dissector::new(dump.as_slice(), config(DumpFormat::V1)) {
            render.render(&record.unwrap()).unwrap();
        }
        render.finish().unwrap();
    }

    let lines: Vec<serde_json::Value> = out
        .split(|&b| b == b'\n')
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_slice(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["Msg"][1], "READ");
    assert_eq!(lines[1]["Truncated"], true);
    let blob = BASE64_STANDARD
        .decode(lines[1]["Msg"][2][0].as_str().unwrap())
        .unwrap();
    assert_eq!(blob, vec![b'z'; 512]);
}
