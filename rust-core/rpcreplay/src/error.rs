// SPDX-License-Identifier: PMPL-1.0-or-later
//
// rpcreplay - Error types
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Two families of failure: format errors (the log itself is unreadable or
// inconsistent) and behavioural mismatches (the code under test no longer
// makes the calls that were recorded). Both are fatal to the operation that
// hit them, never to the whole session.

use thiserror::Error;
use tonic::{Code, Status};

/// Errors that can occur while writing, loading or replaying a log.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// An I/O error occurred while reading or writing the log.
    #[error("rpcreplay: I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The log contains no bytes at all.
    #[error("rpcreplay: empty log")]
    EmptyLog,

    /// The log does not start with the magic token.
    #[error("rpcreplay: not a replay log")]
    NotAReplayLog,

    /// The magic token is present but no initial-state record follows.
    #[error("rpcreplay: missing initial state")]
    MissingInitialState,

    /// The stream ended inside a record.
    #[error("rpcreplay: truncated record: expected {expected} bytes, got {actual}")]
    TruncatedRecord {
        /// Bytes the record (or its length prefix) should have had.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// A record declares (or would need) a length above the allowed maximum.
    #[error("rpcreplay: record of {length} bytes exceeds maximum {max_length}")]
    RecordTooLarge {
        /// The declared or requested length.
        length: usize,
        /// The maximum allowed record length.
        max_length: usize,
    },

    /// Protobuf decoding of an entry record failed.
    #[error("rpcreplay: cannot decode entry: {0}")]
    Decode(#[from] prost::DecodeError),

    /// An entry carries a kind value outside the known set.
    #[error("rpcreplay: unknown entry kind {0}")]
    UnknownKind(i32),

    /// A message payload names a type that was never registered.
    #[error("rpcreplay: unregistered message type {0:?}")]
    UnregisteredType(String),

    /// An entry is internally inconsistent.
    #[error("rpcreplay: malformed entry #{index}: {reason}")]
    MalformedEntry {
        /// 1-based position of the entry in the log.
        index: u32,
        /// What is wrong with it.
        reason: String,
    },

    /// An entry refers to an entry that does not exist or cannot own it.
    #[error("rpcreplay: entry #{index} refers to #{ref_index}, which is not a matching earlier entry")]
    DanglingReference {
        /// 1-based position of the referring entry.
        index: u32,
        /// The back-reference it carries.
        ref_index: u32,
    },

    /// No unconsumed recorded call matches the live call.
    #[error("rpcreplay: unscripted call to {method}")]
    UnscriptedCall {
        /// The method the code under test invoked.
        method: String,
    },

    /// A request was recorded but its response never was.
    #[error("rpcreplay: no recorded response for {method} (request #{index})")]
    MissingResponse {
        /// The method of the recorded request.
        method: String,
        /// 1-based position of the request entry.
        index: u32,
    },

    /// A stream operation was attempted after every recorded item was used.
    #[error("rpcreplay: protocol diverged: stream #{ref_index} ({method}) has no more recorded items")]
    StreamExhausted {
        /// The method that opened the stream.
        method: String,
        /// Position of the CreateStream entry.
        ref_index: u32,
    },

    /// The next recorded stream item does not match the attempted operation.
    #[error("rpcreplay: protocol diverged on stream #{ref_index} ({method}): attempted {attempted}, recorded {recorded}")]
    ProtocolDiverged {
        /// The method that opened the stream.
        method: String,
        /// Position of the CreateStream entry.
        ref_index: u32,
        /// The operation the code under test performed.
        attempted: String,
        /// What the log holds next.
        recorded: String,
    },

    /// The recorder has been closed.
    #[error("rpcreplay: recorder is closed")]
    Closed,

    /// An earlier write to the log failed; nothing more is recorded.
    #[error("rpcreplay: recording stopped after a failed write")]
    WriterFailed,

    /// Entry positions must fit the signed 32-bit wire field.
    #[error("rpcreplay: entry position {0} does not fit in the log format")]
    PositionOverflow(u64),

    /// A mutex guarding shared state was poisoned by a panicking thread.
    #[error("rpcreplay: lock poisoned")]
    LockPoisoned,

    /// JSON serialization failed while dumping a log.
    #[error("rpcreplay: JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReplayError {
    /// True for errors caused by the live calls diverging from the log,
    /// as opposed to a broken log or I/O failure.
    pub fn is_mismatch(&self) -> bool {
        matches!(
            self,
            Self::UnscriptedCall { .. }
                | Self::MissingResponse { .. }
                | Self::StreamExhausted { .. }
                | Self::ProtocolDiverged { .. }
        )
    }

    fn code(&self) -> Code {
        match self {
            _ if self.is_mismatch() => Code::FailedPrecondition,
            Self::Io(_)
            | Self::Closed
            | Self::WriterFailed
            | Self::PositionOverflow(_)
            | Self::LockPoisoned
            | Self::Json(_) => Code::Internal,
            _ => Code::DataLoss,
        }
    }
}

impl From<ReplayError> for Status {
    fn from(error: ReplayError) -> Self {
        Status::new(error.code(), error.to_string())
    }
}

/// Convenience type alias for rpcreplay results.
pub type ReplayResult<T> = Result<T, ReplayError>;
