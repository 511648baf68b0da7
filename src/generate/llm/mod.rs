pub mod anthropic;
pub mod client;
pub mod gemini;
pub mod openai;
pub mod parse;
pub mod prompts;

pub use client::{Dispatch, Dispatcher, ModelClient};
pub use parse::{extract_json_array, parse_reply, parse_test_cases};
pub use prompts::{build_prompt, Prompt};
