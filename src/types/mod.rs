//! Public request and response types for the Heimdall API.

mod message;
mod request;
mod response;

pub use message::Message;
pub use request::{ChatRequest, GenerateRequest};
pub use response::{ChatResponse, GenerateResponse, HealthReport};

pub(crate) use response::word_count;
