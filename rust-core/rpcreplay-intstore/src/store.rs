// SPDX-License-Identifier: PMPL-1.0-or-later
//! In-memory IntStore backend.
//!
//! Plays the part of the live server when recording. Implements
//! [`Channel`] directly, so no network is involved.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rpcreplay::{Channel, ClientStream, RpcMessage};
use tonic::Status;
use tracing::debug;

use crate::proto::{methods, GetRequest, Item, ListItemsRequest, SetResponse, Summary};

type Items = Arc<Mutex<BTreeMap<String, i32>>>;

fn lock(items: &Items) -> Result<MutexGuard<'_, BTreeMap<String, i32>>, Status> {
    items
        .lock()
        .map_err(|_| Status::internal("IntStore lock poisoned"))
}

fn decode<'a, T: 'static>(method: &str, message: &'a dyn RpcMessage) -> Result<&'a T, Status> {
    message.downcast_ref::<T>().ok_or_else(|| {
        Status::invalid_argument(format!("{method}: unexpected message type {}", message.type_url()))
    })
}

/// An integer store held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIntStore {
    items: Items,
}

impl InMemoryIntStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current contents, sorted by name.
    pub fn snapshot(&self) -> Result<Vec<Item>, Status> {
        Ok(lock(&self.items)?
            .iter()
            .map(|(name, value)| Item::new(name.as_str(), *value))
            .collect())
    }
}

#[async_trait]
impl Channel for InMemoryIntStore {
    async fn unary(
        &self,
        method: &str,
        request: &dyn RpcMessage,
    ) -> Result<Box<dyn RpcMessage>, Status> {
        match method {
            methods::SET => {
                let item = decode::<Item>(method, request)?;
                let prev_value = lock(&self.items)?
                    .insert(item.name.clone(), item.value)
                    .unwrap_or(0);
                debug!(name = %item.name, value = item.value, prev_value, "IntStore set");
                Ok(Box::new(SetResponse { prev_value }))
            }
            methods::GET => {
                let request = decode::<GetRequest>(method, request)?;
                let value = lock(&self.items)?.get(&request.name).copied();
                match value {
                    Some(value) => Ok(Box::new(Item::new(request.name.as_str(), value))),
                    None => Err(Status::not_found(format!("{:?}", request.name))),
                }
            }
            _ => Err(Status::unimplemented(format!("unknown method {method}"))),
        }
    }

    async fn open_stream(&self, method: &str) -> Result<Box<dyn ClientStream>, Status> {
        let mode = match method {
            methods::LIST_ITEMS => StreamMode::ListItems,
            methods::SET_STREAM => StreamMode::SetStream,
            methods::STREAM_CHAT => StreamMode::StreamChat,
            _ => return Err(Status::unimplemented(format!("unknown method {method}"))),
        };
        Ok(Box::new(StoreStream {
            items: Arc::clone(&self.items),
            mode,
            outbox: VecDeque::new(),
            requested: false,
            closed: false,
            count: 0,
        }))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamMode {
    /// Server streaming: one request in, matching items out.
    ListItems,
    /// Client streaming: items in, one summary out after close.
    SetStream,
    /// Bidirectional: every item in is stored and echoed back.
    StreamChat,
}

struct StoreStream {
    items: Items,
    mode: StreamMode,
    outbox: VecDeque<Box<dyn RpcMessage>>,
    /// Whether a ListItems request has arrived.
    requested: bool,
    /// Whether the client has closed its side.
    closed: bool,
    count: i32,
}

impl StoreStream {
    fn method(&self) -> &'static str {
        match self.mode {
            StreamMode::ListItems => methods::LIST_ITEMS,
            StreamMode::SetStream => methods::SET_STREAM,
            StreamMode::StreamChat => methods::STREAM_CHAT,
        }
    }
}

#[async_trait]
impl ClientStream for StoreStream {
    async fn send(&mut self, message: &dyn RpcMessage) -> Result<(), Status> {
        let method = self.method();
        if self.closed {
            return Err(Status::failed_precondition(format!("{method}: send after close")));
        }
        match self.mode {
            StreamMode::ListItems => {
                if self.requested {
                    return Err(Status::failed_precondition(format!(
                        "{method}: only one request allowed"
                    )));
                }
                let request = decode::<ListItemsRequest>(method, message)?;
                let items = lock(&self.items)?;
                self.outbox.extend(
                    items
                        .iter()
                        .filter(|(_, value)| **value > request.greater_than)
                        .map(|(name, value)| {
                            Box::new(Item::new(name.as_str(), *value)) as Box<dyn RpcMessage>
                        }),
                );
                self.requested = true;
            }
            StreamMode::SetStream | StreamMode::StreamChat => {
                let item = decode::<Item>(method, message)?;
                lock(&self.items)?.insert(item.name.clone(), item.value);
                self.count += 1;
                if self.mode == StreamMode::StreamChat {
                    self.outbox.push_back(Box::new(item.clone()));
                }
            }
        }
        Ok(())
    }

    async fn close_send(&mut self) -> Result<(), Status> {
        self.closed = true;
        if self.mode == StreamMode::SetStream {
            self.outbox.push_back(Box::new(Summary { count: self.count }));
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Box<dyn RpcMessage>>, Status> {
        let method = self.method();
        match self.mode {
            StreamMode::ListItems if !self.requested => Err(Status::failed_precondition(format!(
                "{method}: recv before request"
            ))),
            StreamMode::SetStream if !self.closed => Err(Status::failed_precondition(format!(
                "{method}: recv before close"
            ))),
            StreamMode::StreamChat if self.outbox.is_empty() && !self.closed => {
                Err(Status::failed_precondition(format!(
                    "{method}: nothing to receive while the client may still send"
                )))
            }
            _ => Ok(self.outbox.pop_front()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::GetRequest;
    use tonic::Code;

    #[tokio::test]
    async fn test_set_then_get() {
        let store = InMemoryIntStore::new();
        let reply = store
            .unary(methods::SET, &Item::new("a", 4))
            .await
            .unwrap();
        assert_eq!(reply.downcast_ref::<SetResponse>().unwrap().prev_value, 0);

        let reply = store
            .unary(methods::GET, &GetRequest { name: "a".into() })
            .await
            .unwrap();
        assert_eq!(reply.downcast_ref::<Item>().unwrap().value, 4);

        let error = store
            .unary(methods::GET, &GetRequest { name: "b".into() })
            .await
            .unwrap_err();
        assert_eq!(error.code(), Code::NotFound);
    }

    #[tokio::test]
    async fn test_wrong_message_type_rejected() {
        let store = InMemoryIntStore::new();
        let error = store
            .unary(methods::SET, &GetRequest { name: "a".into() })
            .await
            .unwrap_err();
        assert_eq!(error.code(), Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_unknown_stream_rejected() {
        let store = InMemoryIntStore::new();
        let error = store.open_stream("/intstore.IntStore/Nope").await.err().unwrap();
        assert_eq!(error.code(), Code::Unimplemented);
    }

    #[tokio::test]
    async fn test_chat_ends_only_after_close() {
        let store = InMemoryIntStore::new();
        let mut stream = store.open_stream(methods::STREAM_CHAT).await.unwrap();
        stream.send(&Item::new("x", 1)).await.unwrap();
        let echoed = stream.recv().await.unwrap().unwrap();
        assert_eq!(echoed.downcast_ref::<Item>().unwrap(), &Item::new("x", 1));

        // Drained but still open: the stream has not ended.
        let error = stream.recv().await.unwrap_err();
        assert_eq!(error.code(), Code::FailedPrecondition);

        stream.close_send().await.unwrap();
        assert!(stream.recv().await.unwrap().is_none());
        assert_eq!(store.snapshot().unwrap(), vec![Item::new("x", 1)]);
    }
}
