pub mod config;
pub mod core;
pub mod domain;
pub mod export;
pub mod llm;
pub mod pdf;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{cli::LocalStorage, toml_config::TomlConfig};

pub use core::{etl::ExtractionEngine, pipeline::InvoicePipeline};
pub use domain::model::{InvoiceExtraction, ProcessedInvoice, RunReport};
pub use llm::OpenAiChatClient;
pub use pdf::{CommandOcr, DocumentReader};
pub use utils::error::{ExtractorError, Result};
