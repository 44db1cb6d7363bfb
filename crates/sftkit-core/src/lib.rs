//! Core types, configuration and errors for sftkit.
//!
//! This crate provides the foundational pieces shared by the data layer and
//! the hub client:
//!
//! - The error taxonomy ([`SftError`]) and [`Result`] alias
//! - Data configuration ([`DataConfig`] and its dataset sources)
//! - Shared types ([`Split`], [`SampleFormat`], [`RawRecord`])
//! - The remote hub capability ([`HubClient`])
//! - Redacted handling of access tokens ([`SecretString`])

#![warn(missing_docs)]

mod config;
mod error;
mod secrets;
mod traits;
mod types;

pub use config::*;
pub use error::*;
pub use secrets::SecretString;
pub use traits::*;
pub use types::*;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::*;
    pub use crate::error::{Result, SftError};
    pub use crate::secrets::SecretString;
    pub use crate::traits::*;
    pub use crate::types::*;
}
