pub mod decode;
pub mod generator;
pub mod keys;
pub mod llm;
pub mod prompts;
pub mod setup;
pub mod workflow;
