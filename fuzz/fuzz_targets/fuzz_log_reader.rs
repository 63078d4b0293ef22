// SPDX-License-Identifier: PMPL-1.0-or-later
// Fuzz target for loading replay logs

#![no_main]

use std::io::Cursor;

use libfuzzer_sys::fuzz_target;
use rpcreplay::{dump_log, Replayer, ReplayerOptions};

fuzz_target!(|data: &[u8]| {
    let registry = rpcreplay_intstore::registry();

    // Arbitrary bytes must load cleanly or fail with an error, never panic
    let _ = Replayer::from_reader(Cursor::new(data), &registry, ReplayerOptions::default());

    // The dumper walks the same path without indexing
    let mut out = Vec::new();
    let _ = dump_log(Cursor::new(data), &registry, &mut out);
});
