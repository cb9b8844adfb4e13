//! CLI command implementations
//!
//! This module contains all CLI command implementations.

pub mod batch;
pub mod context;
pub mod init;
pub mod keygen;
pub mod preview;
pub mod reply;
pub mod rules;
pub mod status;
pub mod validate;
