//! Wire types for the two chat protocols bridged by `msgbridge`.
//!
//! [`client`] holds the chat-completions shapes the gateway accepts and
//! returns, [`upstream`] holds the messages shapes it sends to and reads from
//! the backend. Nothing in this crate performs I/O.

pub mod client;
pub mod upstream;
