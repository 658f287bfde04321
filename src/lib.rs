//! ragstream: streaming retrieval-augmented question answering
//!
//! The binary indexes a set of documents once at startup, then answers
//! questions over HTTP, streaming answer tokens, the reformulated question
//! and the retrieved context to the browser as server-sent events.

pub mod cli;
pub mod server;
pub mod startup;

pub use server::{AppState, router};

#[cfg(test)]
mod tests;
