//! Protobuf messages exchanged between services (`proto/drugstore.proto`).

use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};

pub const PROTOBUF_CONTENT_TYPE: &str = "application/x-protobuf";

#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InvoiceDetails {
    #[prost(int64, tag = "1")]
    pub invoice_id: i64,
    #[prost(int64, optional, tag = "2")]
    pub order_id: ::core::option::Option<i64>,
    #[prost(string, tag = "3")]
    pub status: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub invoice_type: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "5")]
    pub items: ::prost::alloc::vec::Vec<InvoiceDetailsItem>,
    #[prost(string, tag = "6")]
    pub total: ::prost::alloc::string::String,
}

#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InvoiceDetailsItem {
    #[prost(int64, tag = "1")]
    pub price_item_id: i64,
    #[prost(int64, tag = "2")]
    pub product_id: i64,
    #[prost(string, tag = "3")]
    pub name: ::prost::alloc::string::String,
    #[prost(int32, tag = "4")]
    pub quantity: i32,
    #[prost(string, tag = "5")]
    pub price: ::prost::alloc::string::String,
}

#[allow(clippy::derive_partial_eq_without_eq)]
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProductQuantityMap {
    #[prost(map = "int64, int32", tag = "1")]
    pub quantities: ::std::collections::HashMap<i64, i32>,
}

/// Response body encoded as protobuf.
pub struct Protobuf<M>(pub M);

impl<M: prost::Message> IntoResponse for Protobuf<M> {
    fn into_response(self) -> Response {
        let mut response = self.0.encode_to_vec().into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(PROTOBUF_CONTENT_TYPE),
        );
        response
    }
}
