// SPDX-License-Identifier: PMPL-1.0-or-later
//! Protobuf types for the `intstore.IntStore` service.
//!
//! Pre-generated from `intstore.proto`; kept by hand so the crate builds
//! without `protoc`.

/// Fully-qualified method names.
pub mod methods {
    pub const SET: &str = "/intstore.IntStore/Set";
    pub const GET: &str = "/intstore.IntStore/Get";
    pub const LIST_ITEMS: &str = "/intstore.IntStore/ListItems";
    pub const SET_STREAM: &str = "/intstore.IntStore/SetStream";
    pub const STREAM_CHAT: &str = "/intstore.IntStore/StreamChat";
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Item {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(int32, tag = "2")]
    pub value: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SetResponse {
    #[prost(int32, tag = "1")]
    pub prev_value: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct GetRequest {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Summary {
    #[prost(int32, tag = "1")]
    pub count: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListItemsRequest {
    #[prost(int32, tag = "1")]
    pub greater_than: i32,
}

macro_rules! impl_name {
    ($($ty:ident => $name:literal),* $(,)?) => {
        $(
            impl ::prost::Name for $ty {
                const NAME: &'static str = $name;
                const PACKAGE: &'static str = "intstore";

                fn full_name() -> ::prost::alloc::string::String {
                    concat!("intstore.", $name).into()
                }

                fn type_url() -> ::prost::alloc::string::String {
                    concat!("type.googleapis.com/intstore.", $name).into()
                }
            }
        )*
    };
}

impl_name! {
    Item => "Item",
    SetResponse => "SetResponse",
    GetRequest => "GetRequest",
    Summary => "Summary",
    ListItemsRequest => "ListItemsRequest",
}

impl Item {
    pub fn new(name: impl Into<String>, value: i32) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// A registry that can decode every message type of the service.
pub fn registry() -> rpcreplay::TypeRegistry {
    rpcreplay::TypeRegistry::new()
        .with::<Item>()
        .with::<SetResponse>()
        .with::<GetRequest>()
        .with::<Summary>()
        .with::<ListItemsRequest>()
}
