//! Chat prompt templates

use ragstream_core::ChatMessage;

pub const CONTEXTUALIZE_Q_SYSTEM_PROMPT: &str = "Given a chat history and the latest user question \
which might reference context in the chat history, formulate a standalone question \
which can be understood without the chat history. Do NOT answer the question, \
just reformulate it if needed and otherwise return it as is.";

pub const QA_SYSTEM_PROMPT: &str = "You are an assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, just say that you don't know. \
Use three sentences maximum and keep the answer concise.
{context}";

/// A system message, the chat history, then the human question.
///
/// The system text may contain a `{context}` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatPromptTemplate {
    system: String,
}

impl ChatPromptTemplate {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
        }
    }

    pub fn contextualize() -> Self {
        Self::new(CONTEXTUALIZE_Q_SYSTEM_PROMPT)
    }

    pub fn question_answering() -> Self {
        Self::new(QA_SYSTEM_PROMPT)
    }

    pub fn format_messages(
        &self,
        question: &str,
        chat_history: &[ChatMessage],
        context: Option<&str>,
    ) -> Vec<ChatMessage> {
        let system = match context {
            Some(context) => self.system.replace("{context}", context),
            None => self.system.clone(),
        };

        let mut messages = Vec::with_capacity(chat_history.len() + 2);
        messages.push(ChatMessage::system(system));
        messages.extend(chat_history.iter().cloned());
        messages.push(ChatMessage::user(question));
        messages
    }
}
