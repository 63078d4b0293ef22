// SPDX-License-Identifier: PMPL-1.0-or-later
//
// rpcreplay - Protobuf wire records
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Hand-maintained prost types for the log format. Equivalent .proto:
//
//   message Entry {
//     Kind kind = 1;
//     string method = 2;
//     google.protobuf.Any message = 3;
//     bool is_error = 4;
//     int32 ref_index = 5;
//   }
//   enum Kind { UNSPECIFIED = 0; REQUEST = 1; RESPONSE = 2;
//               CREATE_STREAM = 3; SEND = 4; RECV = 5; }

/// One entry as stored in a framed record.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EntryRecord {
    #[prost(enumeration = "WireKind", tag = "1")]
    pub kind: i32,
    #[prost(string, tag = "2")]
    pub method: ::prost::alloc::string::String,
    /// Absent only for the stream-termination sentinel.
    #[prost(message, optional, tag = "3")]
    pub message: ::core::option::Option<::prost_types::Any>,
    #[prost(bool, tag = "4")]
    pub is_error: bool,
    #[prost(int32, tag = "5")]
    pub ref_index: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum WireKind {
    Unspecified = 0,
    Request = 1,
    Response = 2,
    CreateStream = 3,
    Send = 4,
    Recv = 5,
}

/// Normalized RPC error, shaped like `google.rpc.Status`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RpcStatus {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
}

impl ::prost::Name for RpcStatus {
    const NAME: &'static str = "Status";
    const PACKAGE: &'static str = "google.rpc";

    fn full_name() -> ::prost::alloc::string::String {
        "google.rpc.Status".into()
    }

    fn type_url() -> ::prost::alloc::string::String {
        "type.googleapis.com/google.rpc.Status".into()
    }
}

impl From<&tonic::Status> for RpcStatus {
    fn from(status: &tonic::Status) -> Self {
        Self {
            code: status.code() as i32,
            message: status.message().to_string(),
        }
    }
}

impl From<RpcStatus> for tonic::Status {
    fn from(status: RpcStatus) -> Self {
        tonic::Status::new(tonic::Code::from_i32(status.code), status.message)
    }
}

/// Payload of a successful CreateStream entry (`google.protobuf.Empty`).
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StreamOpened {}

impl ::prost::Name for StreamOpened {
    const NAME: &'static str = "Empty";
    const PACKAGE: &'static str = "google.protobuf";

    fn full_name() -> ::prost::alloc::string::String {
        "google.protobuf.Empty".into()
    }

    fn type_url() -> ::prost::alloc::string::String {
        "type.googleapis.com/google.protobuf.Empty".into()
    }
}
