pub mod config;
pub mod llm;
pub mod models;
pub mod relay;
pub mod repos;
