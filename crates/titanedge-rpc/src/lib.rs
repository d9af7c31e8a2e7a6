//! Request/response plumbing on top of the Titan Edge message catalog.
//!
//! The client side uses a [`CorrelatedChannel`] (or a [`TitanEdgeClient`]
//! bound to one element) to send batches and collect correlated replies
//! under a sliding timeout. The device side uses a [`Dispatcher`] to route
//! each decoded message to the executor attached for its kind.

pub mod channel;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;

#[cfg(feature = "async")]
pub use channel::ReplyStream;
pub use channel::{CorrelatedChannel, Replies, SendOutcome};
pub use client::TitanEdgeClient;
pub use config::{
    ChannelConfig, DEFAULT_REPLY_TIMEOUT, PROTOCOL_NAME, RECEIVER_PARAMETER, RESPONSE_PARAMETER,
};
pub use dispatcher::{Dispatcher, Executor, ExecutorError, ExecutorResult, HandleReport};
pub use error::{Result, RpcError};
