// SPDX-License-Identifier: PMPL-1.0-or-later
//! The call abstraction recorded and replayed.
//!
//! A [`Channel`] is whatever the client under test sends its RPCs through.
//! The live backend, the [`Recorder`](crate::Recorder) and the
//! [`Replayer`](crate::Replayer) all implement it, so client code is written
//! once against `Arc<dyn Channel>` and runs unchanged in all three modes.

use std::sync::Arc;

use async_trait::async_trait;
use tonic::Status;

use crate::message::RpcMessage;

/// A connection capable of unary and streaming calls.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Perform a unary call.
    async fn unary(
        &self,
        method: &str,
        request: &dyn RpcMessage,
    ) -> Result<Box<dyn RpcMessage>, Status>;

    /// Open a stream. Server-, client- and bidirectional streaming all go
    /// through the same [`ClientStream`] surface.
    async fn open_stream(&self, method: &str) -> Result<Box<dyn ClientStream>, Status>;
}

/// The client side of an open stream.
#[async_trait]
pub trait ClientStream: Send {
    /// Send one item to the server.
    async fn send(&mut self, message: &dyn RpcMessage) -> Result<(), Status>;

    /// Signal that the client will send nothing more.
    async fn close_send(&mut self) -> Result<(), Status>;

    /// Receive the next item; `Ok(None)` once the server has finished.
    async fn recv(&mut self) -> Result<Option<Box<dyn RpcMessage>>, Status>;
}

#[async_trait]
impl<C: Channel + ?Sized> Channel for Arc<C> {
    async fn unary(
        &self,
        method: &str,
        request: &dyn RpcMessage,
    ) -> Result<Box<dyn RpcMessage>, Status> {
        (**self).unary(method, request).await
    }

    async fn open_stream(&self, method: &str) -> Result<Box<dyn ClientStream>, Status> {
        (**self).open_stream(method).await
    }
}

/// Downcast a response to the type the caller expects.
pub fn expect_message<T: 'static>(method: &str, message: Box<dyn RpcMessage>) -> Result<T, Status> {
    let type_url = message.type_url();
    message.downcast::<T>().map(|boxed| *boxed).ok_or_else(|| {
        Status::internal(format!("{method}: unexpected response type {type_url}"))
    })
}
