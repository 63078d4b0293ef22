// SPDX-License-Identifier: PMPL-1.0-or-later
//! Typed client for the IntStore service.
//!
//! Works over any [`Channel`]: the in-memory store, a [`rpcreplay::Recorder`]
//! or a [`rpcreplay::Replayer`].

use std::sync::Arc;

use rpcreplay::{expect_message, Channel, ClientStream};
use tonic::Status;

use crate::proto::{methods, GetRequest, Item, ListItemsRequest, SetResponse, Summary};

#[derive(Clone)]
pub struct IntStoreClient {
    channel: Arc<dyn Channel>,
}

impl IntStoreClient {
    pub fn new(channel: Arc<dyn Channel>) -> Self {
        Self { channel }
    }

    /// Store `value` under `name`. Returns the previous value, or 0.
    pub async fn set(&self, name: &str, value: i32) -> Result<i32, Status> {
        let reply = self
            .channel
            .unary(methods::SET, &Item::new(name, value))
            .await?;
        Ok(expect_message::<SetResponse>(methods::SET, reply)?.prev_value)
    }

    /// Fetch the value stored under `name`. `NotFound` if absent.
    pub async fn get(&self, name: &str) -> Result<i32, Status> {
        let reply = self
            .channel
            .unary(methods::GET, &GetRequest { name: name.to_string() })
            .await?;
        Ok(expect_message::<Item>(methods::GET, reply)?.value)
    }

    /// All items whose value is strictly greater than `greater_than`.
    pub async fn list_items(&self, greater_than: i32) -> Result<Vec<Item>, Status> {
        let mut stream = self.channel.open_stream(methods::LIST_ITEMS).await?;
        stream.send(&ListItemsRequest { greater_than }).await?;
        stream.close_send().await?;

        let mut items = Vec::new();
        while let Some(message) = stream.recv().await? {
            items.push(expect_message::<Item>(methods::LIST_ITEMS, message)?);
        }
        Ok(items)
    }

    /// Upload `items` in one client stream and return the server's summary.
    pub async fn set_stream(&self, items: &[Item]) -> Result<Summary, Status> {
        let mut stream = self.channel.open_stream(methods::SET_STREAM).await?;
        for item in items {
            stream.send(item).await?;
        }
        stream.close_send().await?;

        let summary = match stream.recv().await? {
            Some(message) => expect_message::<Summary>(methods::SET_STREAM, message)?,
            None => {
                return Err(Status::internal(format!(
                    "{}: stream ended without a summary",
                    methods::SET_STREAM
                )))
            }
        };
        if stream.recv().await?.is_some() {
            return Err(Status::internal(format!(
                "{}: more than one summary",
                methods::SET_STREAM
            )));
        }
        Ok(summary)
    }

    /// Open a bidirectional chat: every item sent is stored and echoed.
    pub async fn stream_chat(&self) -> Result<ChatStream, Status> {
        let inner = self.channel.open_stream(methods::STREAM_CHAT).await?;
        Ok(ChatStream { inner })
    }
}

impl std::fmt::Debug for IntStoreClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntStoreClient").finish_non_exhaustive()
    }
}

/// Typed handle for `StreamChat`.
pub struct ChatStream {
    inner: Box<dyn ClientStream>,
}

impl ChatStream {
    pub async fn send(&mut self, item: &Item) -> Result<(), Status> {
        self.inner.send(item).await
    }

    pub async fn close_send(&mut self) -> Result<(), Status> {
        self.inner.close_send().await
    }

    /// Next echoed item, or `None` once the server has nothing more.
    pub async fn recv(&mut self) -> Result<Option<Item>, Status> {
        match self.inner.recv().await? {
            Some(message) => Ok(Some(expect_message::<Item>(methods::STREAM_CHAT, message)?)),
            None => Ok(None),
        }
    }
}
