// SPDX-License-Identifier: PMPL-1.0-or-later
//
// rpcreplay - Entry codec
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Maps an `Entry` to and from one framed `EntryRecord`. The payload slot is
// encoded as:
//   message          -> Any(message),    is_error = false
//   error            -> Any(RpcStatus),  is_error = true
//   end of stream    -> (absent),        is_error = true
// `is_error = false` with no Any is malformed.

use std::io::{Read, Write};

use prost::{Message, Name};
use prost_types::Any as AnyMessage;

use crate::entry::{Entry, EntryKind, Payload};
use crate::error::{ReplayError, ReplayResult};
use crate::message::TypeRegistry;
use crate::record::{read_record, write_record};
use crate::wire::{EntryRecord, RpcStatus};

/// Encode an entry into its wire record. Fails if `ref_index` does not fit
/// the signed wire field.
pub fn to_record(entry: &Entry) -> ReplayResult<EntryRecord> {
    let ref_index = i32::try_from(entry.ref_index)
        .map_err(|_| ReplayError::PositionOverflow(u64::from(entry.ref_index)))?;

    let (message, is_error) = match &entry.payload {
        Payload::Message(message) => (Some(message.to_any()), false),
        Payload::Error(status) => {
            let status = RpcStatus::from(status);
            let any = AnyMessage {
                type_url: <RpcStatus as Name>::type_url(),
                value: status.encode_to_vec(),
            };
            (Some(any), true)
        }
        Payload::EndOfStream => (None, true),
    };

    Ok(EntryRecord {
        kind: entry.kind.to_wire(),
        method: entry.method.clone(),
        message,
        is_error,
        ref_index,
    })
}

/// Decode a wire record. `index` is the entry's 1-based log position and
/// only feeds error messages.
pub fn from_record(
    record: EntryRecord,
    registry: &TypeRegistry,
    index: u32,
) -> ReplayResult<Entry> {
    let kind = EntryKind::from_wire(record.kind)?;
    let ref_index = u32::try_from(record.ref_index).map_err(|_| ReplayError::MalformedEntry {
        index,
        reason: format!("negative ref index {}", record.ref_index),
    })?;

    let payload = match (record.is_error, record.message) {
        (true, Some(any)) => {
            if !any.type_url.ends_with(<RpcStatus as Name>::full_name().as_str()) {
                return Err(ReplayError::MalformedEntry {
                    index,
                    reason: format!("error payload has type {:?}", any.type_url),
                });
            }
            let status = RpcStatus::decode(any.value.as_slice())?;
            Payload::Error(status.into())
        }
        (true, None) => Payload::EndOfStream,
        (false, Some(any)) => Payload::Message(registry.decode(&any)?),
        (false, None) => {
            return Err(ReplayError::MalformedEntry {
                index,
                reason: "neither message nor error".to_string(),
            })
        }
    };

    Ok(Entry {
        kind,
        method: record.method,
        payload,
        ref_index,
    })
}

/// Append one entry to a log as a framed record.
pub fn write_entry<W: Write + ?Sized>(writer: &mut W, entry: &Entry) -> ReplayResult<()> {
    write_record(writer, &to_record(entry)?.encode_to_vec())
}

/// Read the next entry. `Ok(None)` means the log has no more entries.
pub fn read_entry<R: Read + ?Sized>(
    reader: &mut R,
    registry: &TypeRegistry,
    index: u32,
) -> ReplayResult<Option<Entry>> {
    let Some(bytes) = read_record(reader)? else {
        return Ok(None);
    };
    let record = EntryRecord::decode(bytes.as_slice())?;
    from_record(record, registry, index).map(Some)
}

/// Iterator over the entries of a log whose header has already been read.
/// Yields `(index, entry)` with 1-based indices and stops after the first
/// error.
pub struct EntryReader<'a, R> {
    reader: R,
    registry: &'a TypeRegistry,
    next_index: u32,
    failed: bool,
}

impl<'a, R: Read> EntryReader<'a, R> {
    pub fn new(reader: R, registry: &'a TypeRegistry) -> Self {
        Self {
            reader,
            registry,
            next_index: 1,
            failed: false,
        }
    }
}

impl<R: Read> Iterator for EntryReader<'_, R> {
    type Item = ReplayResult<(u32, Entry)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let index = self.next_index;
        match read_entry(&mut self.reader, self.registry, index) {
            Ok(Some(entry)) => {
                self.next_index += 1;
                Some(Ok((index, entry)))
            }
            Ok(None) => None,
            Err(error) => {
                self.failed = true;
                Some(Err(error))
            }
        }
    }
}
