//! clausewatch: watches an upload folder for contracts, indexes their text
//! and has an LLM classify them, extract key clauses, score risk and
//! summarise. Results land as JSON next to a BM25 chunk index.

pub mod core;
pub mod bootstrap;
pub mod llm;
pub mod parser;
pub mod agent;
pub mod store;
pub mod pipeline;
pub mod watcher;
pub mod report;

pub use self::core::{config, error};
pub use bootstrap::logger;
