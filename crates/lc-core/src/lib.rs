//! lc-core: Core types and traits for localchat
//!
//! This crate provides the data model, stream decoding, and backend traits
//! shared by the HTTP clients and the terminal interface.

pub mod backend;
pub mod error;
pub mod install;
pub mod message;
pub mod model;
pub mod store;
pub mod stream;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backend::{ChatBackend, ChatRequest, ChatStream, InferenceServer, PullStream};
pub use error::Error;
pub use install::{InstallProgress, InstallStage};
pub use message::{ChatMessage, Role, Transcript};
pub use model::{format_size, InstalledModel, ModelDetails, ModelSummary, TagsResponse};
pub use store::Store;
pub use stream::{
    decode_chat_line, decode_pull_line, ChatChunk, LineBuffer, PullEvent, PullStatus, DATA_PREFIX,
};

pub type Result<T> = std::result::Result<T, Error>;
