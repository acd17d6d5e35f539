//! Command implementations for the Prism CLI.

pub mod archive;
pub mod chat;
pub mod generate;
pub mod ingest;
