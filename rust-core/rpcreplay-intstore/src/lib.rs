// SPDX-License-Identifier: PMPL-1.0-or-later
//
// rpcreplay-intstore
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// A small integer-store service with one method of every RPC shape:
//
// - Set, Get           unary
// - ListItems          server streaming
// - SetStream          client streaming
// - StreamChat         bidirectional streaming
//
// `InMemoryIntStore` is the live backend and `IntStoreClient` the typed
// client. Together with rpcreplay they form the end-to-end test bed for
// recording and replaying every call shape.

pub mod client;
pub mod proto;
pub mod store;

pub use client::{ChatStream, IntStoreClient};
pub use proto::{methods, registry, GetRequest, Item, ListItemsRequest, SetResponse, Summary};
pub use store::InMemoryIntStore;
