//! Prompt templates for question condensation and grounded answering.

use std::fmt::Write;

use crate::conversation::ConversationTurn;
use crate::document::RetrievalResult;

/// Reply the generator is told to give when the context does not contain the answer.
pub const INSUFFICIENT_CONTEXT_REPLY: &str =
    "I don't know: the provided document does not contain enough information to answer.";

/// Build the request that rewrites a follow-up into a self-contained question.
pub fn condense_question_prompt(history: &[ConversationTurn], question: &str) -> String {
    let mut prompt = String::from(
        "Given the following conversation and a follow up question, rephrase the follow up \
         question to be a standalone question that can be understood without the conversation. \
         Resolve pronouns and omitted words using the conversation, keep the original language, \
         and reply with the standalone question only.\n\nChat History:\n",
    );
    for turn in history {
        let _ = writeln!(prompt, "Human: {}", turn.question);
        let _ = writeln!(prompt, "Assistant: {}", turn.answer);
    }
    let _ = write!(prompt, "\nFollow Up Input: {question}\nStandalone question:");
    prompt
}

/// Build the answering request from a standalone question and retrieved context.
///
/// Context passages appear in retrieval order, numbered and tagged with their page.
pub fn grounded_answer_prompt(question: &str, context: &[RetrievalResult]) -> String {
    let mut prompt = format!(
        "Use only the following pieces of context from a document to answer the question at \
         the end. If the context does not contain the answer, reply exactly: \
         \"{INSUFFICIENT_CONTEXT_REPLY}\" Do not make up an answer.\n\nContext:\n"
    );
    for (position, result) in context.iter().enumerate() {
        let _ = writeln!(
            prompt,
            "[{}] (page {})\n{}\n",
            position + 1,
            result.chunk.page,
            result.chunk.text.trim()
        );
    }
    let _ = write!(prompt, "Question: {question}\nHelpful Answer:");
    prompt
}
