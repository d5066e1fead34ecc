use super::descriptor::{ProviderDescriptor, ProviderId};
use super::local::Availability;
use super::request::SummaryRequest;
use super::streaming::FragmentStream;
use crate::error::ProviderError;
use async_trait::async_trait;

/// Capability surface every backend offers.
#[async_trait]
pub trait Provider: Send + Sync {
    fn id(&self) -> ProviderId;

    fn descriptor(&self) -> &'static ProviderDescriptor {
        self.id().descriptor()
    }

    /// Check whether `credential` is accepted. Never errors: any failure,
    /// including a network one, reads as `false`.
    async fn validate_key(&self, credential: &str) -> bool;

    /// Models this credential can use, filtered to ones that can summarize,
    /// newest-looking first.
    async fn list_models(&self, credential: Option<&str>) -> Result<Vec<String>, ProviderError>;

    /// Open a summary stream. Request validation, auth rejection and a failed
    /// connection attempt surface here, before any fragment exists.
    async fn summarize(&self, request: &SummaryRequest) -> Result<FragmentStream, ProviderError>;

    /// Only the on-device engine can be anything but available.
    async fn availability(&self) -> Availability {
        Availability::Available
    }
}

/// Shared format check run before the network check in `validate_key`.
pub(crate) fn passes_key_format(descriptor: &ProviderDescriptor, credential: &str) -> bool {
    let credential = credential.trim();
    if credential.is_empty() {
        return false;
    }
    descriptor
        .key_prefix
        .is_none_or(|prefix| credential.starts_with(prefix))
}

/// Reverse lexical order without duplicates; date-suffixed names sort newest
/// first.
pub(crate) fn sort_model_ids(mut ids: Vec<String>) -> Vec<String> {
    ids.sort_unstable_by(|a, b| b.cmp(a));
    ids.dedup();
    ids
}
