pub mod align;
pub mod config;
pub mod error;
pub mod language;
pub mod merge;
pub mod openai;
pub mod paragraphs;
pub mod parser;
pub mod pipeline;
pub mod progress;
pub mod tmx;
