// SPDX-License-Identifier: PMPL-1.0-or-later
//
// rpcreplay - Domain messages and the type registry
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Messages of many types share one log. Each is stored as a self-describing
// `Any` (type URL + encoded bytes) and turned back into a concrete type at
// load time through a `TypeRegistry`.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

use prost_types::Any as AnyMessage;

use crate::error::{ReplayError, ReplayResult};
use crate::wire::StreamOpened;

// ---------------------------------------------------------------------------
// RpcMessage
// ---------------------------------------------------------------------------

/// An object-safe view of a protobuf message.
///
/// Blanket-implemented for every `prost` message that also implements
/// [`prost::Name`], so generated types can be passed straight through a
/// [`Channel`](crate::Channel).
pub trait RpcMessage: fmt::Debug + Send + Sync + 'static {
    /// The `type.googleapis.com/...` URL identifying the concrete type.
    fn type_url(&self) -> String;

    /// Protobuf encoding of the message.
    fn encode_payload(&self) -> Vec<u8>;

    /// Clone into a new box.
    fn clone_message(&self) -> Box<dyn RpcMessage>;

    /// Structural equality against a message of possibly different type.
    fn eq_message(&self, other: &dyn RpcMessage) -> bool;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T> RpcMessage for T
where
    T: prost::Message + prost::Name + fmt::Debug + Clone + PartialEq + Default + 'static,
{
    fn type_url(&self) -> String {
        <T as prost::Name>::type_url()
    }

    fn encode_payload(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    fn clone_message(&self) -> Box<dyn RpcMessage> {
        Box::new(self.clone())
    }

    fn eq_message(&self, other: &dyn RpcMessage) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| other == self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

impl dyn RpcMessage {
    /// Whether the concrete type is `T`.
    pub fn is<T: 'static>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }

    /// Take ownership of the concrete message, or `None` if it is not a `T`.
    pub fn downcast<T: 'static>(self: Box<Self>) -> Option<Box<T>> {
        self.into_any().downcast::<T>().ok()
    }

    /// Wrap the message in a self-describing `Any`.
    pub fn to_any(&self) -> AnyMessage {
        AnyMessage {
            type_url: self.type_url(),
            value: self.encode_payload(),
        }
    }
}

impl Clone for Box<dyn RpcMessage> {
    fn clone(&self) -> Self {
        self.clone_message()
    }
}

impl PartialEq for dyn RpcMessage {
    fn eq(&self, other: &Self) -> bool {
        self.eq_message(other)
    }
}

// ---------------------------------------------------------------------------
// TypeRegistry
// ---------------------------------------------------------------------------

type DecodeFn = fn(&[u8]) -> Result<Box<dyn RpcMessage>, prost::DecodeError>;

/// Maps protobuf full names to decoders for concrete message types.
///
/// Every message type that may appear in a log must be registered before the
/// log is loaded.
#[derive(Clone)]
pub struct TypeRegistry {
    decoders: HashMap<String, DecodeFn>,
}

impl TypeRegistry {
    /// A registry that knows only the built-in stream-opened marker.
    pub fn new() -> Self {
        let mut registry = Self {
            decoders: HashMap::new(),
        };
        registry.register::<StreamOpened>();
        registry
    }

    /// Register `T` so payloads carrying its type URL decode to it.
    pub fn register<T>(&mut self) -> &mut Self
    where
        T: prost::Message + prost::Name + fmt::Debug + Clone + PartialEq + Default + 'static,
    {
        fn decode<T>(bytes: &[u8]) -> Result<Box<dyn RpcMessage>, prost::DecodeError>
        where
            T: prost::Message + prost::Name + fmt::Debug + Clone + PartialEq + Default + 'static,
        {
            Ok(Box::new(T::decode(bytes)?))
        }

        self.decoders.insert(T::full_name(), decode::<T>);
        self
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with<T>(mut self) -> Self
    where
        T: prost::Message + prost::Name + fmt::Debug + Clone + PartialEq + Default + 'static,
    {
        self.register::<T>();
        self
    }

    pub fn contains(&self, type_url: &str) -> bool {
        self.decoders.contains_key(full_name(type_url))
    }

    /// Decode a self-describing payload into its registered concrete type.
    pub fn decode(&self, any: &AnyMessage) -> ReplayResult<Box<dyn RpcMessage>> {
        let decode = self
            .decoders
            .get(full_name(&any.type_url))
            .ok_or_else(|| ReplayError::UnregisteredType(any.type_url.clone()))?;
        Ok(decode(&any.value)?)
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.decoders.keys().collect();
        names.sort();
        f.debug_struct("TypeRegistry").field("types", &names).finish()
    }
}

/// The part of a type URL after the last `/`.
fn full_name(type_url: &str) -> &str {
    type_url
        .rsplit_once('/')
        .map_or(type_url, |(_, name)| name)
}
