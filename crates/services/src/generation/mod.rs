mod client;
mod generator;
mod parse;
mod prompt;

pub use client::{AiClient, AiConfig, ImageAttachment};
pub use generator::{
    AiQuestionGenerator, DEFAULT_BATCH_SIZE, GenerationRequest, MAX_BATCH_SIZE,
    QuestionGenerator,
};
pub use parse::parse_questions;
