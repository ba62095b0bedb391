//! Agentic invoice extraction: prompt building, tool dispatch, the
//! tool-calling loop, output repair/validation and the OCR verifier.

pub mod agent;
pub mod client;
pub mod prompts;
pub mod repair;
pub mod schema;
pub mod tools;
pub mod verify;

pub use agent::{AgentOutcome, AgentSettings, ExtractionAgent};
pub use client::OpenAiChatClient;
pub use verify::{OcrVerifier, VerificationResult};
