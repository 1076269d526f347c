//! Fixed prompt and message texts.

use chrono::{DateTime, TimeZone};

pub const EXTRACTION_PROMPT: &str = "You are an expert detail extractor. Given the following text, \
extract all relevant details. Be detailed on what's relevant.";

pub const FINAL_ANSWER_INSTRUCTION: &str = "Please provide the best answer you can based on the \
information already gathered, even if it's not complete.";

pub const FALLBACK_ANSWER: &str = "I couldn't find enough information to answer that.";

pub const ALREADY_SEARCHED: &str =
    "This query has already been searched. Please rephrase or ask a different question.";

pub const NO_VALID_CONTENT: &str = "Unable to retrieve any valid content from the search results.";

/// The system message that opens every conversation.
pub fn system_prompt<Tz: TimeZone>(persona: &str, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{persona} The current date and time is {}. Provide concise, accurate answers based on \
         the most recent information available. When necessary, you may search the web to \
         retrieve additional and up-to-date information. Ensure you are not repeating the same \
         search query, avoiding redundant queries from those contained in 'Previous web search \
         queries'. To answer questions about a social-media user, scrape their timeline first, \
         then answer from their stored posts.",
        now.format("%Y-%m-%d %H:%M:%S")
    )
}

/// Action-result text for a search.
pub fn search_result(previous_queries: &[String], summary: &str) -> String {
    format!("Previous web search queries: {previous_queries:?}\nSummarized results: {summary}")
}

/// System message for answering from a user's stored posts.
pub fn stored_user_prompt(screen_name: &str) -> String {
    format!(
        "You answer questions about the social-media user @{screen_name} using only the \
         extracted details of their posts given below. If the posts do not contain the answer, \
         say so."
    )
}

pub fn stored_user_question(details: &str, query: &str) -> String {
    format!("Details from the posts:\n{details}\n\nQuestion: {query}")
}
