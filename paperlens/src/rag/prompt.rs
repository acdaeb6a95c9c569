//! Prompt assembly for grounded answers.

use crate::completion::Message;
use crate::models::api::{ChatMessage, ExplanationLevel};
use crate::models::chunk::RetrievedChunk;

/// History turns forwarded to the model, newest last.
pub const MAX_HISTORY_TURNS: usize = 5;
/// Chunks turned into user-facing source snippets.
pub const MAX_SOURCES: usize = 3;
/// Characters kept from each source snippet before the ellipsis.
pub const SOURCE_SNIPPET_CHARS: usize = 200;

pub const NO_RELEVANT_INFORMATION: &str = "I couldn't find relevant information in the document \
to answer your question. Please try rephrasing or asking about a different aspect of the paper.";

const GROUNDING_PROMPT: &str = "\
You are an expert AI research paper explainer assistant. Your role is to help users understand \
research papers by providing accurate, well-structured explanations based ONLY on the provided \
context from the paper.

CRITICAL RULES:
1. ONLY use information from the provided context chunks. Do NOT make up or hallucinate information.
2. If the context doesn't contain enough information to answer a question, clearly state that the \
information is not available in the provided context.
3. Always cite specific sections or pages when possible using references from the context.
4. Be precise and accurate - maintain academic rigor.
5. If you're unsure about something, say so rather than guessing.
";

const BEGINNER_STYLE: &str = "
EXPLANATION STYLE: BEGINNER LEVEL
- Use simple, everyday language
- Avoid jargon or explain it when necessary
- Use analogies and examples
- Break down complex concepts into smaller parts
- Focus on \"what\" and \"why\" rather than technical details
- Make it accessible to someone with no background in the field
";

const STUDENT_STYLE: &str = "
EXPLANATION STYLE: STUDENT LEVEL
- Use appropriate academic terminology but define key terms
- Provide context and background when needed
- Explain methodology and approach
- Connect concepts to broader knowledge
- Suitable for undergraduate or graduate students
- Balance simplicity with technical accuracy
";

const RESEARCHER_STYLE: &str = "
EXPLANATION STYLE: RESEARCHER LEVEL
- Use precise technical and academic terminology
- Assume familiarity with the field
- Focus on methodology, implementation details, and technical nuances
- Discuss implications, limitations, and connections to other work
- Provide implementation insights and technical details
- Suitable for researchers and practitioners in the field
";

pub fn system_prompt(level: ExplanationLevel) -> String {
    let style = match level {
        ExplanationLevel::Beginner => BEGINNER_STYLE,
        ExplanationLevel::Student => STUDENT_STYLE,
        ExplanationLevel::Researcher => RESEARCHER_STYLE,
    };
    format!("{GROUNDING_PROMPT}{style}")
}

/// Numbered context block, one `[Context i]` entry per chunk with its page
/// label when known.
pub fn format_context(chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return "No relevant context found.".to_string();
    }

    let mut parts = Vec::with_capacity(chunks.len() * 4);
    for (i, chunk) in chunks.iter().enumerate() {
        parts.push(format!("[Context {}]", i + 1));
        if let Some(page) = chunk.page().filter(|p| !p.is_empty()) {
            parts.push(format!("Source: {page}"));
        }
        parts.push(chunk.content.clone());
        parts.push(String::new());
    }
    parts.join("\n")
}

fn user_message(context: &str, question: &str) -> String {
    format!(
        "Based on the following context from a research paper, please answer the question.\n\
         \n\
         CONTEXT FROM PAPER:\n\
         {context}\n\
         \n\
         QUESTION: {question}\n\
         \n\
         Please provide a clear, accurate answer based only on the context provided above."
    )
}

/// System prompt, the last `MAX_HISTORY_TURNS` history turns verbatim, then
/// the question wrapped with its context.
pub fn build_messages(
    question: &str,
    chunks: &[RetrievedChunk],
    level: ExplanationLevel,
    history: &[ChatMessage],
) -> Vec<Message> {
    let recent = &history[history.len().saturating_sub(MAX_HISTORY_TURNS)..];

    let mut messages = Vec::with_capacity(recent.len() + 2);
    messages.push(Message::system(system_prompt(level)));
    messages.extend(
        recent
            .iter()
            .map(|turn| Message::new(turn.role.as_str(), turn.content.as_str())),
    );
    messages.push(Message::user(user_message(&format_context(chunks), question)));
    messages
}

/// The first `SOURCE_SNIPPET_CHARS` characters of the top chunks, each
/// followed by `...`.
pub fn source_snippets(chunks: &[RetrievedChunk]) -> Vec<String> {
    chunks
        .iter()
        .take(MAX_SOURCES)
        .map(|chunk| {
            let snippet: String = chunk.content.chars().take(SOURCE_SNIPPET_CHARS).collect();
            format!("{snippet}...")
        })
        .collect()
}
