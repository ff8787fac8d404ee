// src/core/mod.rs

pub mod errors;
pub mod mime;
pub mod protocol;
pub mod tasks;

pub use errors::FtpBridgeError;
