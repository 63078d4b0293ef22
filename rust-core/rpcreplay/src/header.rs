// SPDX-License-Identifier: PMPL-1.0-or-later
//
// rpcreplay - Log header
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// A log opens with the magic token followed by exactly one framed record
// holding the caller's opaque initial state (possibly empty).

use std::io::{Read, Write};

use crate::error::{ReplayError, ReplayResult};
use crate::record::{read_full, read_record, write_record};

/// Token identifying a replay log.
pub const MAGIC: &[u8] = b"RPCReplay";

/// Write the magic token and the initial-state record.
pub fn write_header<W: Write + ?Sized>(writer: &mut W, initial_state: &[u8]) -> ReplayResult<()> {
    writer.write_all(MAGIC)?;
    write_record(writer, initial_state)
}

/// Validate the magic token and return the initial-state bytes.
pub fn read_header<R: Read + ?Sized>(reader: &mut R) -> ReplayResult<Vec<u8>> {
    let mut token = [0u8; MAGIC.len()];
    match read_full(reader, &mut token)? {
        0 => return Err(ReplayError::EmptyLog),
        n if n < MAGIC.len() => return Err(ReplayError::NotAReplayLog),
        _ => {}
    }
    if &token[..] != MAGIC {
        return Err(ReplayError::NotAReplayLog);
    }

    match read_record(reader) {
        Ok(Some(initial_state)) => Ok(initial_state),
        Ok(None) | Err(ReplayError::TruncatedRecord { .. }) => {
            Err(ReplayError::MissingInitialState)
        }
        Err(other) => Err(other),
    }
}
