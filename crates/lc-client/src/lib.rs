//! lc-client: HTTP clients for localchat
//!
//! This crate implements the `InferenceServer` and `ChatBackend` traits over
//! reqwest for an Ollama-compatible server and a streaming chat proxy.

pub mod chat;
pub mod http;
pub mod ollama;

#[cfg(test)]
mod test_server;

pub use chat::HttpChatBackend;
pub use ollama::OllamaClient;
