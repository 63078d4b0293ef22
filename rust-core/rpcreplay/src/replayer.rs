// SPDX-License-Identifier: PMPL-1.0-or-later
//
// rpcreplay - Replayer
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The `Replayer` loads a whole log up front and answers calls from it
// instead of a backend. Unary calls are matched against a FIFO queue of
// recorded calls per method; streams are matched against a FIFO queue of
// CreateStream entries per method, and every stream then walks its own
// cursor of Send/Recv items in recorded order. Any divergence fails the
// operation immediately.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tonic::Status;
use tracing::{debug, info, warn};

use crate::channel::{Channel, ClientStream};
use crate::codec::EntryReader;
use crate::entry::{Entry, EntryKind, Payload};
use crate::error::{ReplayError, ReplayResult};
use crate::header::read_header;
use crate::message::{RpcMessage, TypeRegistry};
use crate::recorder::{prepare, BeforeFn};

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Settings for a replay session.
#[derive(Clone, Default)]
pub struct ReplayerOptions {
    /// Match unary calls on request content as well as method, taking the
    /// oldest unconsumed call whose recorded request equals the live one,
    /// and require stream sends to equal the recorded sends. Needed when
    /// concurrent calls to the same method may arrive in a different order
    /// than they were recorded.
    pub match_requests: bool,

    /// Run on a copy of each live request before matching. Should apply the
    /// same rewriting as the recorder's `before_record`.
    pub before_match: Option<BeforeFn>,
}

impl fmt::Debug for ReplayerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayerOptions")
            .field("match_requests", &self.match_requests)
            .field("before_match", &self.before_match.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Script: the in-memory index of a loaded log
// ---------------------------------------------------------------------------

/// A recorded unary call.
struct UnaryCall {
    /// Position of the Request entry.
    index: u32,
    request: Box<dyn RpcMessage>,
    /// `None` if the recording stopped before the call returned.
    response: Option<Payload>,
}

/// A recorded stream and its unconsumed items.
struct RecordedStream {
    method: String,
    open: Payload,
    items: VecDeque<(u32, Entry)>,
}

#[derive(Default)]
struct Script {
    calls: HashMap<String, VecDeque<UnaryCall>>,
    /// CreateStream positions per method, oldest first.
    stream_opens: HashMap<String, VecDeque<u32>>,
    streams: HashMap<u32, RecordedStream>,
    entries: u32,
}

impl Script {
    fn insert(&mut self, index: u32, entry: Entry) -> ReplayResult<()> {
        self.entries = index;
        if entry.ref_index >= index {
            return Err(ReplayError::DanglingReference {
                index,
                ref_index: entry.ref_index,
            });
        }

        match entry.kind {
            EntryKind::Request => {
                let Payload::Message(request) = entry.payload else {
                    return Err(malformed(index, "request without a message"));
                };
                self.calls
                    .entry(entry.method)
                    .or_default()
                    .push_back(UnaryCall {
                        index,
                        request,
                        response: None,
                    });
            }
            EntryKind::Response => {
                if matches!(entry.payload, Payload::EndOfStream) {
                    return Err(malformed(index, "unary response cannot end a stream"));
                }
                let queue = self.calls.get_mut(&entry.method);
                // Responses written without a back-reference answer the
                // oldest unanswered request of the same method.
                let call = queue.and_then(|queue| {
                    queue.iter_mut().find(|call| {
                        if entry.ref_index == 0 {
                            call.response.is_none()
                        } else {
                            call.index == entry.ref_index
                        }
                    })
                });
                let Some(call) = call else {
                    return Err(ReplayError::DanglingReference {
                        index,
                        ref_index: entry.ref_index,
                    });
                };
                if call.response.is_some() {
                    return Err(malformed(index, "second response to the same request"));
                }
                call.response = Some(entry.payload);
            }
            EntryKind::CreateStream => {
                if matches!(entry.payload, Payload::EndOfStream) {
                    return Err(malformed(index, "stream creation cannot end a stream"));
                }
                self.stream_opens
                    .entry(entry.method.clone())
                    .or_default()
                    .push_back(index);
                self.streams.insert(
                    index,
                    RecordedStream {
                        method: entry.method,
                        open: entry.payload,
                        items: VecDeque::new(),
                    },
                );
            }
            EntryKind::Send | EntryKind::Recv => {
                let stream = self
                    .streams
                    .get_mut(&entry.ref_index)
                    .filter(|stream| stream.method == entry.method)
                    .ok_or(ReplayError::DanglingReference {
                        index,
                        ref_index: entry.ref_index,
                    })?;
                stream.items.push_back((index, entry));
            }
        }
        Ok(())
    }

    fn remaining(&self) -> usize {
        let calls: usize = self.calls.values().map(VecDeque::len).sum();
        let opens: usize = self.stream_opens.values().map(VecDeque::len).sum();
        let items: usize = self.streams.values().map(|stream| stream.items.len()).sum();
        calls + opens + items
    }
}

fn malformed(index: u32, reason: &str) -> ReplayError {
    ReplayError::MalformedEntry {
        index,
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Replayer
// ---------------------------------------------------------------------------

struct Shared {
    script: Mutex<Script>,
    options: ReplayerOptions,
}

impl Shared {
    fn lock(&self) -> ReplayResult<MutexGuard<'_, Script>> {
        self.script.lock().map_err(|_| ReplayError::LockPoisoned)
    }
}

/// A [`Channel`] that answers calls from a recorded log.
pub struct Replayer {
    shared: Arc<Shared>,
    initial_state: Vec<u8>,
}

impl Replayer {
    /// Load the log at `path`.
    pub fn open(
        path: impl AsRef<Path>,
        registry: &TypeRegistry,
        options: ReplayerOptions,
    ) -> ReplayResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let replayer = Self::from_reader(BufReader::new(file), registry, options)?;
        info!(path = %path.display(), "Replaying RPCs");
        Ok(replayer)
    }

    /// Load a log from any reader. The whole log is read and indexed before
    /// this returns; format errors surface here.
    pub fn from_reader<R: Read>(
        mut reader: R,
        registry: &TypeRegistry,
        options: ReplayerOptions,
    ) -> ReplayResult<Self> {
        let initial_state = read_header(&mut reader)?;
        let mut script = Script::default();
        for item in EntryReader::new(reader, registry) {
            let (index, entry) = item?;
            script.insert(index, entry)?;
        }

        debug!(
            entries = script.entries,
            streams = script.streams.len(),
            initial_state_len = initial_state.len(),
            "Loaded replay log"
        );

        Ok(Self {
            shared: Arc::new(Shared {
                script: Mutex::new(script),
                options,
            }),
            initial_state,
        })
    }

    /// The initial-state bytes stored when the log was recorded.
    pub fn initial_state(&self) -> &[u8] {
        &self.initial_state
    }

    /// Count of recorded calls, streams and stream items not yet consumed.
    pub fn remaining(&self) -> ReplayResult<usize> {
        Ok(self.shared.lock()?.remaining())
    }

    /// Replay a unary call. The outer result reports matching failures; the
    /// inner one is the recorded outcome of the call.
    pub fn replay_unary(
        &self,
        method: &str,
        request: &dyn RpcMessage,
    ) -> ReplayResult<Result<Box<dyn RpcMessage>, Status>> {
        let options = &self.shared.options;
        let probe = match prepare(options.before_match.as_ref(), method, request) {
            Ok(probe) => probe,
            Err(status) => return Ok(Err(status)),
        };

        let mut script = self.shared.lock()?;
        let queue = script.calls.get_mut(method);
        let call = queue.and_then(|queue| {
            let position = if options.match_requests {
                queue
                    .iter()
                    .position(|call| call.request.eq_message(probe.as_ref()))?
            } else {
                0
            };
            queue.remove(position)
        });

        let Some(call) = call else {
            warn!(method, "Unscripted call");
            return Err(ReplayError::UnscriptedCall {
                method: method.to_string(),
            });
        };

        debug!(method, index = call.index, "Replayed unary call");
        match call.response {
            Some(Payload::Message(message)) => Ok(Ok(message)),
            Some(Payload::Error(status)) => Ok(Err(status)),
            Some(Payload::EndOfStream) => Err(malformed(call.index, "unary response ends a stream")),
            None => Err(ReplayError::MissingResponse {
                method: method.to_string(),
                index: call.index,
            }),
        }
    }

    /// Open the next recorded stream for `method`. A stream whose opening
    /// failed when recorded yields that error as the inner result.
    pub fn replay_stream(&self, method: &str) -> ReplayResult<Result<ReplayStream, Status>> {
        let mut script = self.shared.lock()?;
        let ref_index = script
            .stream_opens
            .get_mut(method)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| {
                warn!(method, "Unscripted stream");
                ReplayError::UnscriptedCall {
                    method: method.to_string(),
                }
            })?;

        let failed = match script.streams.get(&ref_index).map(|stream| &stream.open) {
            Some(Payload::Error(status)) => Some(status.clone()),
            _ => None,
        };
        if let Some(status) = failed {
            script.streams.remove(&ref_index);
            return Ok(Err(status));
        }

        debug!(method, ref_index, "Replayed stream open");
        Ok(Ok(ReplayStream {
            shared: Arc::clone(&self.shared),
            method: method.to_string(),
            ref_index,
        }))
    }
}

impl fmt::Debug for Replayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replayer")
            .field("initial_state_len", &self.initial_state.len())
            .field("options", &self.shared.options)
            .finish()
    }
}

#[async_trait]
impl Channel for Replayer {
    async fn unary(
        &self,
        method: &str,
        request: &dyn RpcMessage,
    ) -> Result<Box<dyn RpcMessage>, Status> {
        self.replay_unary(method, request)?
    }

    async fn open_stream(&self, method: &str) -> Result<Box<dyn ClientStream>, Status> {
        match self.replay_stream(method)? {
            Ok(stream) => Ok(Box::new(stream)),
            Err(status) => Err(status),
        }
    }
}

// ---------------------------------------------------------------------------
// ReplayStream
// ---------------------------------------------------------------------------

/// The operation the code under test attempted on a stream.
#[derive(Clone, Copy)]
enum StreamOp<'a> {
    Send(&'a dyn RpcMessage),
    CloseSend,
    Recv,
}

impl StreamOp<'_> {
    fn name(&self) -> &'static str {
        match self {
            Self::Send(_) => "send",
            Self::CloseSend => "close_send",
            Self::Recv => "recv",
        }
    }
}

/// A stream answered from the log, one recorded item per operation.
pub struct ReplayStream {
    shared: Arc<Shared>,
    method: String,
    ref_index: u32,
}

impl ReplayStream {
    /// Position of the CreateStream entry this stream replays.
    pub fn ref_index(&self) -> u32 {
        self.ref_index
    }

    pub fn try_send(&self, message: &dyn RpcMessage) -> ReplayResult<Result<(), Status>> {
        let probe = match prepare(self.shared.options.before_match.as_ref(), &self.method, message) {
            Ok(probe) => probe,
            Err(status) => return Ok(Err(status)),
        };
        Ok(match self.advance(StreamOp::Send(probe.as_ref()))? {
            Payload::Error(status) => Err(status),
            _ => Ok(()),
        })
    }

    pub fn try_close_send(&self) -> ReplayResult<Result<(), Status>> {
        Ok(match self.advance(StreamOp::CloseSend)? {
            Payload::Error(status) => Err(status),
            _ => Ok(()),
        })
    }

    pub fn try_recv(&self) -> ReplayResult<Result<Option<Box<dyn RpcMessage>>, Status>> {
        Ok(match self.advance(StreamOp::Recv)? {
            Payload::Message(message) => Ok(Some(message)),
            Payload::EndOfStream => Ok(None),
            Payload::Error(status) => Err(status),
        })
    }

    /// Consume the next recorded item if it matches `op`. On mismatch the
    /// cursor is left where it was.
    fn advance(&self, op: StreamOp<'_>) -> ReplayResult<Payload> {
        let mut script = self.shared.lock()?;
        let next = script
            .streams
            .get(&self.ref_index)
            .and_then(|stream| stream.items.front());
        let Some((index, entry)) = next else {
            warn!(method = %self.method, ref_index = self.ref_index, op = op.name(), "Stream exhausted");
            return Err(ReplayError::StreamExhausted {
                method: self.method.clone(),
                ref_index: self.ref_index,
            });
        };

        let accepted = match (op, entry.kind, &entry.payload) {
            (_, EntryKind::Send, Payload::Error(_)) => !matches!(op, StreamOp::Recv),
            (StreamOp::Send(live), EntryKind::Send, Payload::Message(recorded)) => {
                !self.shared.options.match_requests || recorded.eq_message(live)
            }
            (StreamOp::CloseSend, EntryKind::Send, Payload::EndOfStream) => true,
            (StreamOp::Recv, EntryKind::Recv, _) => true,
            _ => false,
        };
        if !accepted {
            let recorded = format!("{} {}", entry.kind, entry.payload.describe());
            warn!(
                method = %self.method,
                ref_index = self.ref_index,
                attempted = op.name(),
                recorded = %recorded,
                "Stream protocol diverged"
            );
            return Err(ReplayError::ProtocolDiverged {
                method: self.method.clone(),
                ref_index: self.ref_index,
                attempted: op.name().to_string(),
                recorded,
            });
        }

        let index = *index;
        let (_, entry) = script
            .streams
            .get_mut(&self.ref_index)
            .and_then(|stream| stream.items.pop_front())
            .ok_or(ReplayError::StreamExhausted {
                method: self.method.clone(),
                ref_index: self.ref_index,
            })?;
        debug!(method = %self.method, index, op = op.name(), "Replayed stream item");
        Ok(entry.payload)
    }
}

#[async_trait]
impl ClientStream for ReplayStream {
    async fn send(&mut self, message: &dyn RpcMessage) -> Result<(), Status> {
        self.try_send(message)?
    }

    async fn close_send(&mut self) -> Result<(), Status> {
        self.try_close_send()?
    }

    async fn recv(&mut self) -> Result<Option<Box<dyn RpcMessage>>, Status> {
        self.try_recv()?
    }
}
