//! Stream transport contract.
//!
//! The core only needs "open a streaming GET with these headers and tell me
//! about open, error and message events". Concrete transports live in
//! `wikistream-transport`.

pub mod config;
pub mod connection;

pub use config::ReconnectConfig;
pub use connection::{
    BoxedTransport, BoxedTransportHandler, StreamRequest, StreamTransport, TransportHandle,
    TransportHandler,
};
