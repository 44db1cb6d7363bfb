//! Capability traits implemented outside the data layer.

use crate::{RawRecord, Result};

/// Remote dataset hub capability.
///
/// Given a dataset identifier and a split query expression (for example
/// `train[:2%]`), return the selected rows in hub order. The query syntax
/// belongs to the hub; callers forward it untouched.
///
/// Implementations report network, missing-dataset and bad-query failures as
/// [`SftError::RemoteFetch`](crate::SftError::RemoteFetch).
pub trait HubClient: Send + Sync {
    /// Fetch the rows selected by `split_query` from `dataset_id`.
    fn fetch(&self, dataset_id: &str, split_query: &str) -> Result<Vec<RawRecord>>;
}

impl<T: HubClient + ?Sized> HubClient for &T {
    fn fetch(&self, dataset_id: &str, split_query: &str) -> Result<Vec<RawRecord>> {
        (**self).fetch(dataset_id, split_query)
    }
}

impl<T: HubClient + ?Sized> HubClient for std::sync::Arc<T> {
    fn fetch(&self, dataset_id: &str, split_query: &str) -> Result<Vec<RawRecord>> {
        (**self).fetch(dataset_id, split_query)
    }
}
