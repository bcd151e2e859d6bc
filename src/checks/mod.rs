// src/checks/mod.rs
mod http;

pub use http::HttpCheck;
