//! Base runtime resolution.

use kiln_core::ImageReference;

/// A base runtime the build can start from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBase {
    pub reference: ImageReference,
    /// Operating system family the runtime provides (`linux`)
    pub os_family: String,
}

/// Abstraction over base runtime availability for testability.
///
/// The executor consults the resolver once per build, before the first
/// layer commits; an unavailable base aborts with nothing written.
pub trait BaseResolver: Send + Sync {
    fn resolve(&self, reference: &ImageReference) -> Result<ResolvedBase, BaseError>;
}

/// Default resolver: the pin itself is the identity.
///
/// Registry transport is an external collaborator; kiln trusts a reference
/// that passed pinning validation and synthesizes a linux skeleton for it.
pub struct PinnedBaseResolver;

impl BaseResolver for PinnedBaseResolver {
    fn resolve(&self, reference: &ImageReference) -> Result<ResolvedBase, BaseError> {
        Ok(ResolvedBase {
            reference: reference.clone(),
            os_family: "linux".to_owned(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BaseError {
    #[error("base runtime {reference} is unavailable: {detail}")]
    Unavailable { reference: String, detail: String },
}
