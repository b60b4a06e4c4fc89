pub mod collectors;
pub mod ipc;
pub mod llm;
pub mod persistence;
