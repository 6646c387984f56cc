//! Instance metadata lookup.
//!
//! The probe reports a handful of facts about the instance it runs on. They
//! come from the cloud instance metadata service when it is reachable and
//! degrade to placeholders when it is not (local runs, firewalled endpoint).
//!
//! `MetadataSource` is the capability handlers depend on. It never fails:
//! every error mode of a lookup collapses into `None`.

pub mod fallback;
pub mod imds;

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{
    MetadataConfig, PLACEHOLDER_AVAILABILITY_ZONE, PLACEHOLDER_PUBLIC_IP, PLACEHOLDER_UNKNOWN,
};

pub use imds::ImdsClient;

/// A source of instance attributes keyed by metadata path.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Look up one attribute, e.g. `"instance-id"`.
    ///
    /// Returns `None` when the attribute is unavailable for any reason.
    async fn fetch(&self, attribute: &str) -> Option<String>;
}

/// Metadata source used when lookups are switched off in configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledMetadata;

#[async_trait]
impl MetadataSource for DisabledMetadata {
    async fn fetch(&self, _attribute: &str) -> Option<String> {
        None
    }
}

/// Build the metadata source described by configuration.
///
/// A client that cannot be built degrades to `DisabledMetadata`, so the
/// endpoints keep serving placeholders instead of refusing to start.
pub fn source_from_config(config: &MetadataConfig) -> Arc<dyn MetadataSource> {
    if config.enabled {
        source_or_disabled(ImdsClient::new(config))
    } else {
        tracing::info!("Instance metadata lookups disabled");
        Arc::new(DisabledMetadata)
    }
}

fn source_or_disabled<E: Display>(client: Result<ImdsClient, E>) -> Arc<dyn MetadataSource> {
    match client {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to build metadata client, lookups disabled");
            Arc::new(DisabledMetadata)
        }
    }
}

/// Attributes the diagnostic endpoint reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataAttribute {
    PublicIpv4,
    LocalIpv4,
    InstanceId,
    AvailabilityZone,
}

impl MetadataAttribute {
    /// Path of the attribute below the `meta-data/` prefix.
    pub fn path(self) -> &'static str {
        match self {
            MetadataAttribute::PublicIpv4 => "public-ipv4",
            MetadataAttribute::LocalIpv4 => "local-ipv4",
            MetadataAttribute::InstanceId => "instance-id",
            MetadataAttribute::AvailabilityZone => "placement/availability-zone",
        }
    }
}

/// Raw lookup results, each independently absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceFacts {
    pub public_ip: Option<String>,
    pub private_ip: Option<String>,
    pub instance_id: Option<String>,
    pub availability_zone: Option<String>,
}

impl InstanceFacts {
    /// Query all four attributes from `source`.
    ///
    /// With `parallel` the lookups run concurrently, so the added latency is
    /// bounded by the slowest single call instead of the sum.
    pub async fn gather(source: &dyn MetadataSource, parallel: bool) -> Self {
        if parallel {
            let (public_ip, private_ip, instance_id, availability_zone) = tokio::join!(
                fetch_attribute(source, MetadataAttribute::PublicIpv4),
                fetch_attribute(source, MetadataAttribute::LocalIpv4),
                fetch_attribute(source, MetadataAttribute::InstanceId),
                fetch_attribute(source, MetadataAttribute::AvailabilityZone),
            );
            Self {
                public_ip,
                private_ip,
                instance_id,
                availability_zone,
            }
        } else {
            Self {
                public_ip: fetch_attribute(source, MetadataAttribute::PublicIpv4).await,
                private_ip: fetch_attribute(source, MetadataAttribute::LocalIpv4).await,
                instance_id: fetch_attribute(source, MetadataAttribute::InstanceId).await,
                availability_zone: fetch_attribute(source, MetadataAttribute::AvailabilityZone)
                    .await,
            }
        }
    }

    /// Substitute placeholders for missing facts.
    ///
    /// The private address falls back to local name resolution before
    /// settling on the placeholder; `lookup_timeout` bounds that resolution.
    pub async fn resolve(self, lookup_timeout: Duration) -> ResolvedFacts {
        let private_ip = match self.private_ip {
            Some(ip) => ip,
            None => fallback::fallback_private_address(lookup_timeout).await,
        };

        ResolvedFacts {
            public_ip: self
                .public_ip
                .unwrap_or_else(|| PLACEHOLDER_PUBLIC_IP.to_string()),
            private_ip,
            instance_id: self
                .instance_id
                .unwrap_or_else(|| PLACEHOLDER_UNKNOWN.to_string()),
            availability_zone: self
                .availability_zone
                .unwrap_or_else(|| PLACEHOLDER_AVAILABILITY_ZONE.to_string()),
        }
    }
}

/// Instance facts with every field populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFacts {
    pub public_ip: String,
    pub private_ip: String,
    pub instance_id: String,
    pub availability_zone: String,
}

async fn fetch_attribute(
    source: &dyn MetadataSource,
    attribute: MetadataAttribute,
) -> Option<String> {
    source
        .fetch(attribute.path())
        .await
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    const TIMEOUT: Duration = Duration::from_millis(500);

    /// Serves canned values and records the order of lookups.
    struct StubSource {
        values: HashMap<&'static str, &'static str>,
        calls: Mutex<Vec<String>>,
    }

    impl StubSource {
        fn new(values: &[(&'static str, &'static str)]) -> Self {
            Self {
                values: values.iter().copied().collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MetadataSource for StubSource {
        async fn fetch(&self, attribute: &str) -> Option<String> {
            self.calls.lock().unwrap().push(attribute.to_string());
            self.values.get(attribute).map(|v| v.to_string())
        }
    }

    #[test]
    fn test_attribute_paths() {
        assert_eq!(MetadataAttribute::PublicIpv4.path(), "public-ipv4");
        assert_eq!(MetadataAttribute::LocalIpv4.path(), "local-ipv4");
        assert_eq!(MetadataAttribute::InstanceId.path(), "instance-id");
        assert_eq!(
            MetadataAttribute::AvailabilityZone.path(),
            "placement/availability-zone"
        );
    }

    #[tokio::test]
    async fn test_gather_sequential_order() {
        let source = StubSource::new(&[("instance-id", "i-0abc")]);
        let facts = InstanceFacts::gather(&source, false).await;

        assert_eq!(facts.instance_id.as_deref(), Some("i-0abc"));
        assert_eq!(facts.public_ip, None);
        assert_eq!(
            *source.calls.lock().unwrap(),
            vec![
                "public-ipv4",
                "local-ipv4",
                "instance-id",
                "placement/availability-zone"
            ]
        );
    }

    #[tokio::test]
    async fn test_gather_parallel_queries_all() {
        let source = StubSource::new(&[
            ("public-ipv4", "54.1.2.3"),
            ("local-ipv4", "10.0.0.5"),
            ("instance-id", "i-0abc"),
            ("placement/availability-zone", "us-east-1a"),
        ]);
        let facts = InstanceFacts::gather(&source, true).await;

        assert_eq!(source.calls.lock().unwrap().len(), 4);
        assert_eq!(
            facts,
            InstanceFacts {
                public_ip: Some("54.1.2.3".to_string()),
                private_ip: Some("10.0.0.5".to_string()),
                instance_id: Some("i-0abc".to_string()),
                availability_zone: Some("us-east-1a".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_blank_values_are_absent() {
        let source = StubSource::new(&[("public-ipv4", "  \n"), ("instance-id", " i-0abc\n")]);
        let facts = InstanceFacts::gather(&source, true).await;

        assert_eq!(facts.public_ip, None);
        assert_eq!(facts.instance_id.as_deref(), Some("i-0abc"));
    }

    #[tokio::test]
    async fn test_resolve_uses_placeholders() {
        let resolved = InstanceFacts::gather(&DisabledMetadata, true)
            .await
            .resolve(TIMEOUT)
            .await;

        assert_eq!(resolved.public_ip, "indisponivel");
        assert_eq!(resolved.instance_id, "desconhecido");
        assert_eq!(resolved.availability_zone, "desconhecida");
        assert!(!resolved.private_ip.is_empty());
    }

    #[tokio::test]
    async fn test_resolve_keeps_metadata_private_ip() {
        let facts = InstanceFacts {
            private_ip: Some("10.0.0.5".to_string()),
            ..Default::default()
        };
        assert_eq!(facts.resolve(TIMEOUT).await.private_ip, "10.0.0.5");
    }

    #[tokio::test]
    async fn test_client_build_failure_disables_lookups() {
        let source = source_or_disabled(Err::<ImdsClient, _>("backend unavailable"));

        for attribute in ["public-ipv4", "local-ipv4", "instance-id"] {
            assert_eq!(source.fetch(attribute).await, None);
        }
    }

    #[tokio::test]
    async fn test_disabled_config_fetches_nothing() {
        let config = MetadataConfig {
            enabled: false,
            ..Default::default()
        };
        let source = source_from_config(&config);

        assert_eq!(source.fetch("instance-id").await, None);
    }
}
