// SPDX-License-Identifier: PMPL-1.0-or-later
//! Property-based tests for log framing and entry encoding

use std::io::Cursor;

use proptest::prelude::*;
use rpcreplay::{
    read_entry, read_header, read_record, write_entry, write_header, write_record, Entry,
    EntryKind, Payload, RpcStatus, TypeRegistry,
};
use tonic::{Code, Status};

/// Generate arbitrary byte blocks
fn arb_bytes() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..2048)
}

/// Generate arbitrary method names
fn arb_method() -> impl Strategy<Value = String> {
    "/[a-z]{3,8}\\.[A-Z][a-z]{2,8}/[A-Z][a-z]{2,10}"
}

fn arb_kind() -> impl Strategy<Value = EntryKind> {
    prop_oneof![
        Just(EntryKind::Request),
        Just(EntryKind::Response),
        Just(EntryKind::CreateStream),
        Just(EntryKind::Send),
        Just(EntryKind::Recv),
    ]
}

fn arb_payload() -> impl Strategy<Value = Payload> {
    prop_oneof![
        (any::<i32>(), ".{0,40}").prop_map(|(code, message)| {
            Payload::message(RpcStatus { code, message })
        }),
        (0i32..17, ".{0,40}").prop_map(|(code, message)| {
            Payload::Error(Status::new(Code::from_i32(code), message))
        }),
        Just(Payload::EndOfStream),
    ]
}

proptest! {
    #[test]
    fn test_record_roundtrip(payload in arb_bytes()) {
        let mut buf = Vec::new();
        write_record(&mut buf, &payload).unwrap();
        prop_assert_eq!(buf.len(), payload.len() + 4);

        let mut cursor = Cursor::new(buf);
        prop_assert_eq!(read_record(&mut cursor).unwrap(), Some(payload));
        prop_assert!(read_record(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn test_header_roundtrip(initial_state in arb_bytes()) {
        let mut buf = Vec::new();
        write_header(&mut buf, &initial_state).unwrap();
        let mut cursor = Cursor::new(buf);
        prop_assert_eq!(read_header(&mut cursor).unwrap(), initial_state);
    }

    #[test]
    fn test_entry_roundtrip(
        kind in arb_kind(),
        method in arb_method(),
        payload in arb_payload(),
        ref_index in 0u32..10_000
    ) {
        let entry = Entry::new(kind, method, payload).with_ref(ref_index);
        let mut buf = Vec::new();
        write_entry(&mut buf, &entry).unwrap();

        let registry = TypeRegistry::new().with::<RpcStatus>();
        let decoded = read_entry(&mut Cursor::new(buf), &registry, 1).unwrap().unwrap();
        prop_assert_eq!(decoded, entry);
    }

    #[test]
    fn test_equality_is_strict_on_envelope(
        method in arb_method(),
        payload in arb_payload(),
        ref_index in 1u32..10_000
    ) {
        let base = Entry::new(EntryKind::Send, method.clone(), payload.clone()).with_ref(ref_index);
        let other_kind = Entry::new(EntryKind::Recv, method.clone(), payload.clone()).with_ref(ref_index);
        let other_method = Entry::new(EntryKind::Send, format!("{method}x"), payload.clone()).with_ref(ref_index);
        let other_ref = Entry::new(EntryKind::Send, method, payload).with_ref(ref_index + 1);

        prop_assert_ne!(&base, &other_kind);
        prop_assert_ne!(&base, &other_method);
        prop_assert_ne!(&base, &other_ref);
    }

    #[test]
    fn test_truncated_log_never_panics(initial_state in arb_bytes(), cut in 0usize..64) {
        let mut buf = Vec::new();
        write_header(&mut buf, &initial_state).unwrap();
        let keep = buf.len().saturating_sub(cut + 1);
        buf.truncate(keep);
        prop_assert!(read_header(&mut Cursor::new(buf)).is_err());
    }
}
