// SPDX-License-Identifier: PMPL-1.0-or-later
//
// rpcreplay crate
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Records the RPCs a client makes against a live backend into a single log
// file, then replays that log in place of the backend so the same client
// code can be tested hermetically and deterministically.
//
// # Architecture
//
// Client code talks to a `Channel`. In record mode the channel is a
// `Recorder` wrapping the live channel; every call is appended to the log as
// one or more entries. In replay mode the channel is a `Replayer` that has
// loaded the log and answers each call with the next matching recorded
// outcome. Unary calls match per method in FIFO order; streams match their
// CreateStream entry per method and then walk their own Send/Recv cursor.
//
// ## Log format (all integers little-endian)
//
// ```text
// "RPCReplay"                          -- magic token
// [4 bytes: len (u32)][len bytes]      -- initial state
// [4 bytes: len (u32)][len bytes]*     -- one protobuf Entry per record
//
// Entry { kind, method, message: Any?, is_error, ref_index }
// ```
//
// `ref_index` is the 1-based position of the CreateStream entry for stream
// items, and of the Request entry for responses.
//
// ## Usage
//
// ```no_run
// use std::sync::Arc;
// use rpcreplay::{Channel, Recorder, RecorderOptions, Replayer, ReplayerOptions, TypeRegistry};
//
// # async fn run(live: Arc<dyn Channel>, request: &dyn rpcreplay::RpcMessage) -> Result<(), Box<dyn std::error::Error>> {
// // Record.
// let recorder = Recorder::create("/tmp/calls.replay", live, RecorderOptions::default())?;
// let _response = recorder.unary("/intstore.IntStore/Get", request).await?;
// recorder.close()?;
//
// // Replay.
// let registry = TypeRegistry::new();
// let replayer = Replayer::open("/tmp/calls.replay", &registry, ReplayerOptions::default())?;
// let _same = replayer.unary("/intstore.IntStore/Get", request).await?;
// # Ok(())
// # }
// ```

pub mod channel;
pub mod codec;
pub mod dump;
pub mod entry;
pub mod error;
pub mod header;
pub mod message;
pub mod record;
pub mod recorder;
pub mod replayer;
pub mod wire;

// Re-export the primary public API for ergonomic imports.
pub use channel::{expect_message, Channel, ClientStream};
pub use codec::{read_entry, write_entry, EntryReader};
pub use dump::{dump_file, dump_log};
pub use entry::{Entry, EntryKind, Payload};
pub use error::{ReplayError, ReplayResult};
pub use header::{read_header, write_header, MAGIC};
pub use message::{RpcMessage, TypeRegistry};
pub use record::{read_record, write_record, MAX_RECORD_SIZE};
pub use recorder::{BeforeFn, FlushMode, Recorder, RecorderOptions};
pub use replayer::{ReplayStream, Replayer, ReplayerOptions};
pub use wire::{RpcStatus, StreamOpened};
