//! hrbot: HR assistant chatbot service
//!
//! This library provides:
//! - A content adapter between UI message shapes and Gemini content parts
//! - Two HR data tools (employee/vacation lookup, holiday policy) the model
//!   can call during generation
//! - Per-connection chat sessions with an idle-eviction sweep
//! - An HTTP server exposing the chat API and a single-page chat widget

pub mod config;
pub mod content;
pub mod llm;
pub mod prompt;
pub mod server;
pub mod session;
pub mod tools;

pub use config::Config;
