//! CLI command implementations for the RCC job token tool.

pub mod keys;
pub mod token;
