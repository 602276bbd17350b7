//! Ownership metadata resolution.
//!
//! Each run stamps consumer metadata onto every infraction it records. The
//! resolver seam lets a deployment enrich or replace the metadata the
//! request carried (e.g. from a structured ownership registry) without
//! touching orchestration logic.

use crate::error::EngineResult;
use async_trait::async_trait;
use verdict_types::{ArtifactRef, ConsumerMetadata};

/// Resolve the metadata to stamp on infractions for one artifact.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    async fn resolve(
        &self,
        artifact: &ArtifactRef,
        request: &ConsumerMetadata,
    ) -> EngineResult<ConsumerMetadata>;
}

/// Default resolver: every artifact gets the request's own metadata.
pub struct PassthroughResolver;

#[async_trait]
impl MetadataResolver for PassthroughResolver {
    async fn resolve(
        &self,
        _artifact: &ArtifactRef,
        request: &ConsumerMetadata,
    ) -> EngineResult<ConsumerMetadata> {
        Ok(request.clone())
    }
}

/// Fixed resolver: every artifact gets the configured metadata, ignoring
/// the request. Useful for tests and single-tenant deployments.
pub struct StaticResolver {
    metadata: ConsumerMetadata,
}

impl StaticResolver {
    pub fn new(metadata: ConsumerMetadata) -> Self {
        Self { metadata }
    }
}

#[async_trait]
impl MetadataResolver for StaticResolver {
    async fn resolve(
        &self,
        _artifact: &ArtifactRef,
        _request: &ConsumerMetadata,
    ) -> EngineResult<ConsumerMetadata> {
        Ok(self.metadata.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_passthrough_returns_request_metadata() {
        let artifact = ArtifactRef::new("templates", "a.json");
        let request = ConsumerMetadata {
            business_unit: "payments".into(),
            ..ConsumerMetadata::default()
        };

        let resolved = PassthroughResolver
            .resolve(&artifact, &request)
            .await
            .unwrap();
        assert_eq!(resolved, request);
    }

    #[tokio::test]
    async fn test_static_overrides_request_metadata() {
        let artifact = ArtifactRef::new("templates", "a.json");
        let configured = ConsumerMetadata {
            business_unit: "platform".into(),
            ..ConsumerMetadata::default()
        };
        let resolver = StaticResolver::new(configured.clone());

        let resolved = resolver
            .resolve(&artifact, &ConsumerMetadata::default())
            .await
            .unwrap();
        assert_eq!(resolved, configured);
    }
}
