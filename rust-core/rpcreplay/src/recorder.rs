// SPDX-License-Identifier: PMPL-1.0-or-later
//
// rpcreplay - Recorder
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The `Recorder` sits between the client under test and a live `Channel`.
// Every call passes through unchanged; on the way it is turned into entries
// that are appended to the log. All appends go through one mutex-guarded
// writer, which is what gives the log its single total order.

use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tonic::Status;
use tracing::{debug, info, warn};

use crate::channel::{Channel, ClientStream};
use crate::codec::write_entry;
use crate::entry::{Entry, EntryKind, Payload};
use crate::error::{ReplayError, ReplayResult};
use crate::header::write_header;
use crate::message::RpcMessage;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Hook run on a copy of each outgoing request (unary request or stream
/// send) before it is recorded or matched. It may rewrite the copy, for
/// example to blank out timestamps, or reject the call with a `Status`.
pub type BeforeFn = Arc<dyn Fn(&str, &mut dyn RpcMessage) -> Result<(), Status> + Send + Sync>;

/// Controls how eagerly the recorder pushes buffered bytes to its sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FlushMode {
    /// Flush after every entry, so a test that panics mid-run still leaves
    /// a readable log behind.
    #[default]
    EveryEntry,

    /// Flush only when the recorder is closed or dropped.
    OnClose,
}

/// Settings for a recording session.
#[derive(Clone, Default)]
pub struct RecorderOptions {
    /// Opaque bytes stored in the log header and handed back by
    /// [`Replayer::initial_state`](crate::Replayer::initial_state).
    pub initial_state: Vec<u8>,

    pub before_record: Option<BeforeFn>,

    pub flush: FlushMode,
}

impl fmt::Debug for RecorderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecorderOptions")
            .field("initial_state_len", &self.initial_state.len())
            .field("before_record", &self.before_record.is_some())
            .field("flush", &self.flush)
            .finish()
    }
}

/// Clone `message` and run the hook over the copy.
pub(crate) fn prepare(
    before: Option<&BeforeFn>,
    method: &str,
    message: &dyn RpcMessage,
) -> Result<Box<dyn RpcMessage>, Status> {
    let mut copy = message.clone_message();
    if let Some(hook) = before {
        hook(method, copy.as_mut())?;
    }
    Ok(copy)
}

// ---------------------------------------------------------------------------
// LogWriter
// ---------------------------------------------------------------------------

struct WriterState {
    /// `None` once the recorder has been closed or a write has failed.
    sink: Option<BufWriter<Box<dyn Write + Send>>>,
    /// Number of entries written so far; the last entry's position.
    written: u32,
    flush: FlushMode,
    /// Set after an I/O error. The log then ends at the last complete entry.
    failed: bool,
}

/// The single ordering point for every append.
struct LogWriter {
    state: Mutex<WriterState>,
}

impl LogWriter {
    /// Append an entry and return its 1-based position.
    fn append(&self, entry: &Entry) -> ReplayResult<u32> {
        let mut state = self.state.lock().map_err(|_| ReplayError::LockPoisoned)?;
        if state.failed {
            return Err(ReplayError::WriterFailed);
        }
        let index = state
            .written
            .checked_add(1)
            .filter(|index| i32::try_from(*index).is_ok())
            .ok_or(ReplayError::PositionOverflow(u64::from(state.written) + 1))?;

        let flush = state.flush;
        let sink = state.sink.as_mut().ok_or(ReplayError::Closed)?;
        let result = match write_entry(&mut *sink, entry) {
            Ok(()) if flush == FlushMode::EveryEntry => sink.flush().map_err(ReplayError::from),
            other => other,
        };

        if let Err(error) = result {
            if matches!(error, ReplayError::Io(_)) {
                // Discard whatever is still buffered so a partial entry can
                // never reach the sink on a later flush.
                if let Some(sink) = state.sink.take() {
                    let _ = sink.into_parts();
                }
                state.failed = true;
                warn!(index, error = %error, "Log write failed; recording stopped");
            }
            return Err(error);
        }

        state.written = index;
        debug!(
            index,
            kind = %entry.kind,
            method = %entry.method,
            ref_index = entry.ref_index,
            "Recorded entry"
        );
        Ok(index)
    }

    fn close(&self) -> ReplayResult<u32> {
        let mut state = self.state.lock().map_err(|_| ReplayError::LockPoisoned)?;
        if let Some(mut sink) = state.sink.take() {
            sink.flush()?;
        }
        Ok(state.written)
    }

    fn written(&self) -> ReplayResult<u32> {
        let state = self.state.lock().map_err(|_| ReplayError::LockPoisoned)?;
        Ok(state.written)
    }
}

// ---------------------------------------------------------------------------
// Recorder
// ---------------------------------------------------------------------------

/// A [`Channel`] that forwards to a live channel and records every call.
pub struct Recorder {
    inner: Arc<dyn Channel>,
    log: Arc<LogWriter>,
    before_record: Option<BeforeFn>,
}

impl Recorder {
    /// Create (or truncate) the log file at `path` and start recording.
    pub fn create(
        path: impl AsRef<Path>,
        inner: Arc<dyn Channel>,
        options: RecorderOptions,
    ) -> ReplayResult<Self> {
        let path = path.as_ref();
        let file = File::create(path)?;
        info!(path = %path.display(), "Recording RPCs");
        Self::from_writer(file, inner, options)
    }

    /// Record into an arbitrary writer. The header is written immediately.
    pub fn from_writer<W: Write + Send + 'static>(
        writer: W,
        inner: Arc<dyn Channel>,
        options: RecorderOptions,
    ) -> ReplayResult<Self> {
        let boxed: Box<dyn Write + Send> = Box::new(writer);
        let mut sink = BufWriter::new(boxed);
        write_header(&mut sink, &options.initial_state)?;
        sink.flush()?;

        Ok(Self {
            inner,
            log: Arc::new(LogWriter {
                state: Mutex::new(WriterState {
                    sink: Some(sink),
                    written: 0,
                    flush: options.flush,
                    failed: false,
                }),
            }),
            before_record: options.before_record,
        })
    }

    /// Flush and release the log. Calls made after closing fail.
    pub fn close(&self) -> ReplayResult<()> {
        let written = self.log.close()?;
        info!(entries = written, "Closed RPC recording");
        Ok(())
    }

    /// Number of entries appended so far.
    pub fn entries_written(&self) -> ReplayResult<u32> {
        self.log.written()
    }
}

#[async_trait]
impl Channel for Recorder {
    async fn unary(
        &self,
        method: &str,
        request: &dyn RpcMessage,
    ) -> Result<Box<dyn RpcMessage>, Status> {
        let recorded = prepare(self.before_record.as_ref(), method, request)?;
        let request_index = self.log.append(&Entry::new(
            EntryKind::Request,
            method,
            Payload::Message(recorded),
        ))?;

        let result = self.inner.unary(method, request).await;

        let response = Entry::new(EntryKind::Response, method, Payload::from_result(result.clone()))
            .with_ref(request_index);
        self.log.append(&response)?;
        result
    }

    async fn open_stream(&self, method: &str) -> Result<Box<dyn ClientStream>, Status> {
        let opened = self.inner.open_stream(method).await;
        let payload = match &opened {
            Ok(_) => Payload::stream_opened(),
            Err(status) => Payload::Error(status.clone()),
        };
        let ref_index = self
            .log
            .append(&Entry::new(EntryKind::CreateStream, method, payload))?;

        Ok(Box::new(RecordingStream {
            inner: opened?,
            log: Arc::clone(&self.log),
            method: method.to_string(),
            ref_index,
            before_record: self.before_record.clone(),
        }))
    }
}

// ---------------------------------------------------------------------------
// RecordingStream
// ---------------------------------------------------------------------------

/// A live stream whose every operation is appended to the log.
struct RecordingStream {
    inner: Box<dyn ClientStream>,
    log: Arc<LogWriter>,
    method: String,
    /// Position of this stream's CreateStream entry.
    ref_index: u32,
    before_record: Option<BeforeFn>,
}

impl RecordingStream {
    fn append(&self, kind: EntryKind, payload: Payload) -> ReplayResult<u32> {
        self.log
            .append(&Entry::new(kind, self.method.as_str(), payload).with_ref(self.ref_index))
    }
}

#[async_trait]
impl ClientStream for RecordingStream {
    async fn send(&mut self, message: &dyn RpcMessage) -> Result<(), Status> {
        let recorded = prepare(self.before_record.as_ref(), &self.method, message)?;
        let result = self.inner.send(message).await;
        let payload = match &result {
            Ok(()) => Payload::Message(recorded),
            Err(status) => Payload::Error(status.clone()),
        };
        self.append(EntryKind::Send, payload)?;
        result
    }

    async fn close_send(&mut self) -> Result<(), Status> {
        let result = self.inner.close_send().await;
        let payload = match &result {
            Ok(()) => Payload::EndOfStream,
            Err(status) => Payload::Error(status.clone()),
        };
        self.append(EntryKind::Send, payload)?;
        result
    }

    async fn recv(&mut self) -> Result<Option<Box<dyn RpcMessage>>, Status> {
        let result = self.inner.recv().await;
        let payload = match &result {
            Ok(Some(message)) => Payload::Message(message.clone()),
            Ok(None) => Payload::EndOfStream,
            Err(status) => Payload::Error(status.clone()),
        };
        self.append(EntryKind::Recv, payload)?;
        result
    }
}
