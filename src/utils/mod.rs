pub mod attrs;
pub mod display_name;
pub mod error;
pub mod logger;
pub mod monitor;
pub mod validation;
