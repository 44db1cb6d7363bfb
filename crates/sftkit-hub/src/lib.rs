//! HuggingFace Hub integration for sftkit.
//!
//! This crate provides:
//! - [`HfHubClient`], the [`HubClient`](sftkit_core::HubClient) backed by the hub's parquet shards
//! - The split query syntax (`train[:2%]`, `train[-2%:]+test`) used to select rows

#![warn(missing_docs)]

mod download;
mod split_query;

pub use download::*;
pub use split_query::*;
