pub mod accumulator;
pub mod attachment;
pub mod client;
pub mod config;
pub mod errors;
pub mod models;
pub mod protocol;
pub mod session;
pub mod transcript;
