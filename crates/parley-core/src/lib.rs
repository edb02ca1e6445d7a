//! Runtime-agnostic support for the Parley messaging core.
//!
//! Holds the pieces shared by server and client that carry no I/O of their
//! own: the [`env::Environment`] abstraction that decouples state machines
//! from system time and randomness, the collaborator store interfaces the
//! core consumes (message and conversation persistence are external to the
//! real-time layer), and the message-creation pipeline that enforces the
//! persist-then-publish contract.

pub mod env;
pub mod pipeline;
pub mod store;

pub use env::Environment;
pub use pipeline::{MessagePipeline, PipelineError, Publish};
pub use store::{
    ConversationStore, MemoryConversationStore, MemoryMessageStore, MessageStore, StoreError,
};
