// SPDX-License-Identifier: PMPL-1.0-or-later
//! Human-readable dump of a replay log, one JSON object per line.
//!
//! The first line describes the header; each following line is one entry.
//! Messages are rendered with their `Debug` form, so every type that appears
//! in the log must be registered.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use serde::Serialize;

use crate::codec::EntryReader;
use crate::entry::{EntryKind, Payload};
use crate::error::ReplayResult;
use crate::header::read_header;
use crate::message::TypeRegistry;

#[derive(Debug, Serialize)]
struct HeaderLine {
    initial_state_len: usize,
}

#[derive(Debug, Serialize)]
struct EntryLine<'a> {
    index: u32,
    kind: EntryKind,
    method: &'a str,
    ref_index: u32,
    payload: PayloadLine,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum PayloadLine {
    Message { type_url: String, value: String },
    Error { code: i32, message: String },
    EndOfStream,
}

impl From<&Payload> for PayloadLine {
    fn from(payload: &Payload) -> Self {
        match payload {
            Payload::Message(message) => Self::Message {
                type_url: message.type_url(),
                value: format!("{message:?}"),
            },
            Payload::Error(status) => Self::Error {
                code: status.code() as i32,
                message: status.message().to_string(),
            },
            Payload::EndOfStream => Self::EndOfStream,
        }
    }
}

/// Dump the log read from `reader` to `out`. Returns the number of entries.
pub fn dump_log<R: Read, W: Write>(
    mut reader: R,
    registry: &TypeRegistry,
    out: &mut W,
) -> ReplayResult<u32> {
    let initial_state = read_header(&mut reader)?;
    serde_json::to_writer(
        &mut *out,
        &HeaderLine {
            initial_state_len: initial_state.len(),
        },
    )?;
    out.write_all(b"\n")?;

    let mut count = 0;
    for item in EntryReader::new(reader, registry) {
        let (index, entry) = item?;
        let line = EntryLine {
            index,
            kind: entry.kind,
            method: &entry.method,
            ref_index: entry.ref_index,
            payload: PayloadLine::from(&entry.payload),
        };
        serde_json::to_writer(&mut *out, &line)?;
        out.write_all(b"\n")?;
        count = index;
    }
    Ok(count)
}

/// Dump the log stored at `path`.
pub fn dump_file<W: Write>(
    path: impl AsRef<Path>,
    registry: &TypeRegistry,
    out: &mut W,
) -> ReplayResult<u32> {
    let file = File::open(path)?;
    dump_log(BufReader::new(file), registry, out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::write_entry;
    use crate::entry::Entry;
    use crate::header::write_header;
    use crate::wire::RpcStatus;
    use std::io::Cursor;
    use tonic::Status;

    #[test]
    fn test_dump_one_line_per_entry() {
        let mut log = Vec::new();
        write_header(&mut log, b"abc").unwrap();
        write_entry(
            &mut log,
            &Entry::new(
                EntryKind::Request,
                "/svc/M",
                Payload::message(RpcStatus {
                    code: 1,
                    message: "hello".to_string(),
                }),
            ),
        )
        .unwrap();
        write_entry(
            &mut log,
            &Entry::new(EntryKind::Response, "/svc/M", Payload::Error(Status::aborted("boom")))
                .with_ref(1),
        )
        .unwrap();

        let registry = TypeRegistry::new().with::<RpcStatus>();
        let mut out = Vec::new();
        let count = dump_log(Cursor::new(log), &registry, &mut out).unwrap();
        assert_eq!(count, 2);

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["initial_state_len"], 3);
        assert_eq!(lines[1]["kind"], "Request");
        assert_eq!(lines[1]["payload"]["type"], "message");
        assert!(lines[1]["payload"]["value"].as_str().unwrap().contains("hello"));
        assert_eq!(lines[2]["ref_index"], 1);
        assert_eq!(lines[2]["payload"]["code"], tonic::Code::Aborted as i32);
    }
}
