//! Prompt templates for grounded answers and the summarize fallback.

/// Case-insensitive phrases that mark an answer as a refusal to use the
/// uploaded document.
pub const FORBIDDEN_PHRASES: &[&str] =
    &["please provide", "paste the document", "i need the text", "provide the file"];

pub fn grounded_prompt(context: &str, query: &str) -> String {
    format!(
        "You are answering based ONLY on the uploaded document.

You MUST:
- Use the context below.
- NEVER ask the user to provide the document.
- NEVER say \"please provide the file\".
- NEVER say \"paste the document\".
- If partial information exists, summarize what is available.
- Do not mention the word \"context\" in your answer.

Document Content:
{context}

User Question:
{query}

Provide a complete and professional answer based strictly on the document.
"
    )
}

pub fn summarize_prompt(context: &str) -> String {
    format!("Summarize this document content clearly:\n{context}")
}
