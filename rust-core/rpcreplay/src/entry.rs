// SPDX-License-Identifier: PMPL-1.0-or-later
//
// rpcreplay - Entry model
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// One captured RPC event. Entries live in a single append-only arena (the
// log); stream items point back at the CreateStream entry that opened their
// stream, and responses at the request they answer.

use std::fmt;

use serde::{Deserialize, Serialize};
use tonic::Status;

use crate::error::{ReplayError, ReplayResult};
use crate::message::RpcMessage;
use crate::wire::{StreamOpened, WireKind};

// ---------------------------------------------------------------------------
// EntryKind
// ---------------------------------------------------------------------------

/// What kind of RPC event an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    /// A unary request, written before the call is made.
    Request,
    /// The outcome of a unary call.
    Response,
    /// A stream was opened (or failed to open).
    CreateStream,
    /// A client-to-server stream item, or the client closing its side.
    Send,
    /// A server-to-client stream item, or the end of the stream.
    Recv,
}

impl EntryKind {
    /// Decode the wire enum value.
    pub fn from_wire(value: i32) -> ReplayResult<Self> {
        match WireKind::try_from(value) {
            Ok(WireKind::Request) => Ok(Self::Request),
            Ok(WireKind::Response) => Ok(Self::Response),
            Ok(WireKind::CreateStream) => Ok(Self::CreateStream),
            Ok(WireKind::Send) => Ok(Self::Send),
            Ok(WireKind::Recv) => Ok(Self::Recv),
            Ok(WireKind::Unspecified) | Err(_) => Err(ReplayError::UnknownKind(value)),
        }
    }

    /// Encode as the wire enum value.
    pub fn to_wire(self) -> i32 {
        let kind = match self {
            Self::Request => WireKind::Request,
            Self::Response => WireKind::Response,
            Self::CreateStream => WireKind::CreateStream,
            Self::Send => WireKind::Send,
            Self::Recv => WireKind::Recv,
        };
        kind as i32
    }

    /// Whether entries of this kind belong to a stream.
    pub fn is_stream_item(self) -> bool {
        matches!(self, Self::Send | Self::Recv)
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Request => "request",
            Self::Response => "response",
            Self::CreateStream => "create-stream",
            Self::Send => "send",
            Self::Recv => "recv",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

/// The single thing an entry carries.
#[derive(Debug, Clone)]
pub enum Payload {
    /// A domain message.
    Message(Box<dyn RpcMessage>),
    /// An RPC error.
    Error(Status),
    /// The stream has no more items in this direction.
    EndOfStream,
}

impl Payload {
    pub fn message(message: impl RpcMessage) -> Self {
        Self::Message(Box::new(message))
    }

    /// Payload recorded for a successfully opened stream.
    pub fn stream_opened() -> Self {
        Self::message(StreamOpened {})
    }

    /// Payload for the outcome of a call that yields a message.
    pub fn from_result(result: Result<Box<dyn RpcMessage>, Status>) -> Self {
        match result {
            Ok(message) => Self::Message(message),
            Err(status) => Self::Error(status),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Short description used in mismatch reports and dumps.
    pub fn describe(&self) -> String {
        match self {
            Self::Message(message) => format!("{message:?}"),
            Self::Error(status) => format!("error {:?}: {}", status.code(), status.message()),
            Self::EndOfStream => "end of stream".to_string(),
        }
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Message(a), Self::Message(b)) => a.eq_message(b.as_ref()),
            (Self::Error(a), Self::Error(b)) => statuses_equal(a, b),
            (Self::EndOfStream, Self::EndOfStream) => true,
            _ => false,
        }
    }
}

/// Errors compare by normalized status, not identity: an error read back
/// from a log never shares a representation with the one that was recorded.
pub fn statuses_equal(a: &Status, b: &Status) -> bool {
    std::ptr::eq(a, b) || (a.code() == b.code() && a.message() == b.message())
}

// ---------------------------------------------------------------------------
// Entry
// ---------------------------------------------------------------------------

/// One captured RPC event.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub kind: EntryKind,

    /// Fully-qualified method name, e.g. `/intstore.IntStore/Get`.
    pub method: String,

    pub payload: Payload,

    /// 1-based log position of the owning entry (CreateStream for stream
    /// items, Request for responses); 0 when there is none.
    pub ref_index: u32,
}

impl Entry {
    pub fn new(kind: EntryKind, method: impl Into<String>, payload: Payload) -> Self {
        Self {
            kind,
            method: method.into(),
            payload,
            ref_index: 0,
        }
    }

    pub fn with_ref(mut self, ref_index: u32) -> Self {
        self.ref_index = ref_index;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::RpcStatus;

    fn message(code: i32) -> Payload {
        Payload::message(RpcStatus {
            code,
            message: "m".to_string(),
        })
    }

    #[test]
    fn test_kind_wire_roundtrip() {
        for kind in [
            EntryKind::Request,
            EntryKind::Response,
            EntryKind::CreateStream,
            EntryKind::Send,
            EntryKind::Recv,
        ] {
            assert_eq!(EntryKind::from_wire(kind.to_wire()).unwrap(), kind);
        }
    }

    #[test]
    fn test_unspecified_kind_rejected() {
        assert!(matches!(EntryKind::from_wire(0), Err(ReplayError::UnknownKind(0))));
        assert!(matches!(EntryKind::from_wire(77), Err(ReplayError::UnknownKind(77))));
    }

    #[test]
    fn test_equality_requires_same_kind_method_and_ref() {
        let base = Entry::new(EntryKind::Send, "/svc/M", message(1)).with_ref(3);
        assert_eq!(base, base.clone());

        let mut other = base.clone();
        other.kind = EntryKind::Recv;
        assert_ne!(base, other);

        let mut other = base.clone();
        other.method = "/svc/N".to_string();
        assert_ne!(base, other);

        let other = base.clone().with_ref(4);
        assert_ne!(base, other);
    }

    #[test]
    fn test_equality_compares_messages_structurally() {
        let a = Entry::new(EntryKind::Request, "/svc/M", message(1));
        let b = Entry::new(EntryKind::Request, "/svc/M", message(1));
        let c = Entry::new(EntryKind::Request, "/svc/M", message(2));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_errors_compare_by_status() {
        let a = Payload::Error(Status::not_found("x"));
        let b = Payload::Error(Status::not_found("x"));
        let c = Payload::Error(Status::not_found("y"));
        let d = Payload::Error(Status::internal("x"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_payload_variants_never_equal_each_other() {
        assert_ne!(Payload::EndOfStream, Payload::Error(Status::cancelled("")));
        assert_ne!(Payload::EndOfStream, Payload::stream_opened());
        assert_eq!(Payload::EndOfStream, Payload::EndOfStream);
    }
}
