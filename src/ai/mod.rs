//! # AI Gateway Module
//!
//! - **prompts**: the two fixed coaching prompts
//! - **client**: OpenAI-compatible chat completion client
//! - **gateway**: prompt formatting, reply parsing and error classification

pub mod client;
pub mod gateway;
pub mod prompts;

#[cfg(test)]
pub mod testing;

pub use client::ChatCompletionClient;
pub use gateway::{AiGateway, CoachingGateway};
