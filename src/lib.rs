//! Library crate for nmap-web-rs exposing reusable modules.
pub mod error;
pub mod geo;
pub mod parser;
pub mod scanner;
pub mod server;
pub mod target;
pub mod types;
