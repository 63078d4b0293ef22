// SPDX-License-Identifier: PMPL-1.0-or-later
// Fuzz target for length-prefixed record framing

#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use rpcreplay::{read_record, write_record};

fuzz_target!(|data: &[u8]| {
    let mut cursor = Cursor::new(data);
    while let Ok(Some(record)) = read_record(&mut cursor) {
        // Anything read back must re-frame to the bytes it came from
        let mut framed = Vec::new();
        write_record(&mut framed, &record).unwrap();
        assert_eq!(framed.len(), record.len() + 4);
    }
});
