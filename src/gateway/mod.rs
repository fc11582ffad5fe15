//! Serving core and its builder

mod builder;
mod serving;

pub use builder::{DEFAULT_MAX_PROMPT_CHARS, DEFAULT_MODEL, Heimdall, HeimdallBuilder};
pub use serving::{Gateway, format_chat_prompt};
