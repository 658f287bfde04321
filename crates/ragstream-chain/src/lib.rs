//! Question answering chains for ragstream
//!
//! A [`RagChain`] wires a chat model and a retriever into either the basic
//! or the contextualized flow. Running it yields tagged lifecycle events
//! instead of a single answer; the tags follow a fixed convention so the SSE
//! relay can pick out answer tokens, reformulated questions and retrieved
//! context.

mod chain;
mod prompts;


pub use chain::{ContextualizePolicy, RagChain};
pub use prompts::{CONTEXTUALIZE_Q_SYSTEM_PROMPT, ChatPromptTemplate, QA_SYSTEM_PROMPT};
