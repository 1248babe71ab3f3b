// Library interface for citybrief modules
// This allows tests and other binaries to import modules

pub mod error;
pub mod ingestion;
pub mod llm;
pub mod locale;
pub mod news;
pub mod prompt;
pub mod ranking;
pub mod relevance;
pub mod sanitize;
pub mod scraping;
pub mod sessions;
pub mod server;
pub mod summary;
pub mod weather;
