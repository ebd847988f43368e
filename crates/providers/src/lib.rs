//! Model backend implementations for Maestro.
//!
//! Currently one backend: any OpenAI-compatible `/chat/completions`
//! endpoint speaking the legacy function-calling protocol.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
