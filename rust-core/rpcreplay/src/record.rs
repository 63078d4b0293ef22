// SPDX-License-Identifier: PMPL-1.0-or-later
//
// rpcreplay - Record framing
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Every block in a log is framed the same way:
//   [4 bytes: length (u32 LE)]
//   [N bytes: payload]
// There is no delimiter, so payload bytes can never collide with framing.

use std::io::{ErrorKind, Read, Write};

use crate::error::{ReplayError, ReplayResult};

/// Maximum allowed record size: 64 MiB. Any record declaring a larger size
/// is treated as corrupted.
pub const MAX_RECORD_SIZE: usize = 64 * 1024 * 1024;

/// Size of the length prefix in front of every record.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Write one length-prefixed record.
///
/// The prefix and payload are assembled into a single buffer and handed to
/// the writer in one `write_all`, so an oversized payload is rejected before
/// anything reaches the sink.
pub fn write_record<W: Write + ?Sized>(writer: &mut W, payload: &[u8]) -> ReplayResult<()> {
    if payload.len() > MAX_RECORD_SIZE {
        return Err(ReplayError::RecordTooLarge {
            length: payload.len(),
            max_length: MAX_RECORD_SIZE,
        });
    }

    let mut buffer = Vec::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    buffer.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buffer.extend_from_slice(payload);
    writer.write_all(&buffer)?;
    Ok(())
}

/// Read one length-prefixed record.
///
/// Returns `Ok(None)` when the stream is exhausted before the first length
/// byte. A stream that ends anywhere inside a record is a
/// [`ReplayError::TruncatedRecord`].
pub fn read_record<R: Read + ?Sized>(reader: &mut R) -> ReplayResult<Option<Vec<u8>>> {
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    let got = read_full(reader, &mut prefix)?;
    if got == 0 {
        return Ok(None);
    }
    if got < LENGTH_PREFIX_SIZE {
        return Err(ReplayError::TruncatedRecord {
            expected: LENGTH_PREFIX_SIZE,
            actual: got,
        });
    }

    let length = u32::from_le_bytes(prefix) as usize;
    if length > MAX_RECORD_SIZE {
        return Err(ReplayError::RecordTooLarge {
            length,
            max_length: MAX_RECORD_SIZE,
        });
    }

    let mut payload = Vec::with_capacity(length);
    reader.take(length as u64).read_to_end(&mut payload)?;
    if payload.len() < length {
        return Err(ReplayError::TruncatedRecord {
            expected: length,
            actual: payload.len(),
        });
    }
    Ok(Some(payload))
}

/// Fill `buf` as far as the reader allows; returns the number of bytes read.
/// Short counts mean end of stream.
pub(crate) fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> ReplayResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_write_layout() {
        let mut buf = Vec::new();
        write_record(&mut buf, b"abc").unwrap();
        assert_eq!(buf, vec![3, 0, 0, 0, b'a', b'b', b'c']);
    }

    #[test]
    fn test_roundtrip_multiple_records() {
        let mut buf = Vec::new();
        write_record(&mut buf, b"first").unwrap();
        write_record(&mut buf, b"").unwrap();
        write_record(&mut buf, &[0xFF; 300]).unwrap();

        let mut cursor = Cursor::new(buf);
        assert_eq!(read_record(&mut cursor).unwrap().unwrap(), b"first");
        assert_eq!(read_record(&mut cursor).unwrap().unwrap(), b"");
        assert_eq!(read_record(&mut cursor).unwrap().unwrap(), vec![0xFF; 300]);
        assert!(read_record(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn test_empty_stream_is_end_of_records() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        assert!(read_record(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn test_truncated_length_prefix() {
        let mut cursor = Cursor::new(vec![5, 0]);
        match read_record(&mut cursor).unwrap_err() {
            ReplayError::TruncatedRecord { expected, actual } => {
                assert_eq!(expected, 4);
                assert_eq!(actual, 2);
            }
            other => panic!("Expected TruncatedRecord, got: {other:?}"),
        }
    }

    #[test]
    fn test_truncated_payload() {
        let mut buf = Vec::new();
        write_record(&mut buf, b"hello world").unwrap();
        buf.truncate(buf.len() - 3);

        let mut cursor = Cursor::new(buf);
        match read_record(&mut cursor).unwrap_err() {
            ReplayError::TruncatedRecord { expected, actual } => {
                assert_eq!(expected, 11);
                assert_eq!(actual, 8);
            }
            other => panic!("Expected TruncatedRecord, got: {other:?}"),
        }
    }

    #[test]
    fn test_declared_length_too_large() {
        let mut cursor = Cursor::new(u32::MAX.to_le_bytes().to_vec());
        assert!(matches!(
            read_record(&mut cursor),
            Err(ReplayError::RecordTooLarge { .. })
        ));
    }

    #[test]
    fn test_oversized_payload_writes_nothing() {
        let mut buf = Vec::new();
        let payload = vec![0u8; MAX_RECORD_SIZE + 1];
        assert!(write_record(&mut buf, &payload).is_err());
        assert!(buf.is_empty());
    }
}
