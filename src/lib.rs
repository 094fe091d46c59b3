pub mod config;
pub mod error;
pub mod gemini;
pub mod identity;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod records;
pub mod routes;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;
