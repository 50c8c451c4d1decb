pub mod text_generator;

pub use text_generator::{generate_json, OpenAiGenerator, StructuredPrompt, TextGenerator};
