// Library interface for newsreel modules
// This allows tests and the binary to import modules

pub mod article;
pub mod assembler;
pub mod batch;
pub mod error;
pub mod imaging;
pub mod llm;
pub mod orchestrator;
pub mod publisher;
pub mod server;
pub mod sources;
pub mod storage;
