use std::time::Duration;

use tracing::{debug, info};

use crate::bus::BusConsumer;
use crate::envelope::{EnvelopeDecoder, ProtobufDecoder};
use crate::error::{InspectError, Result};
use crate::replay::{ReplayConfig, ReplaySink, ReplaySummary, TailReplayer};
use crate::specifier::{resolve, ResolvedTopics, Specifier};
use crate::topic::{TopicNamer, DEFAULT_NAMESPACE};
use crate::topology::TopologySource;

/// Configuration for the inspector.
#[derive(Debug, Clone)]
pub struct InspectorConfig {
    /// Namespace used for every resolved topic (default: `default`).
    ///
    /// Applied regardless of the namespace the pipeline is deployed in.
    pub namespace: String,
    /// Identity presented to the control plane (default: `cli`).
    pub subscriber_name: String,
    /// Timeout for the topology fetch (default: 10 seconds).
    pub topology_timeout: Duration,
    pub replay: ReplayConfig,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.into(),
            subscriber_name: "cli".into(),
            topology_timeout: Duration::from_secs(10),
            replay: ReplayConfig::default(),
        }
    }
}

/// Operator-facing pipeline inspector.
///
/// Resolves a dotted specifier against live topology, then replays the tail
/// of each topic it denotes. Topology is fetched fresh on every call.
pub struct Inspector<T, C, D = ProtobufDecoder> {
    namer: TopicNamer,
    subscriber_name: String,
    topology_timeout: Duration,
    topology: T,
    replayer: TailReplayer<C, D>,
}

impl<T: TopologySource, C: BusConsumer> Inspector<T, C, ProtobufDecoder> {
    pub fn new(config: InspectorConfig, topology: T, consumer: C) -> Result<Self> {
        Self::with_decoder(config, topology, consumer, ProtobufDecoder)
    }
}

impl<T: TopologySource, C: BusConsumer, D: EnvelopeDecoder> Inspector<T, C, D> {
    pub fn with_decoder(
        config: InspectorConfig,
        topology: T,
        consumer: C,
        decoder: D,
    ) -> Result<Self> {
        let namer = TopicNamer::new(config.namespace)?;
        Ok(Self {
            namer,
            subscriber_name: config.subscriber_name,
            topology_timeout: config.topology_timeout,
            topology,
            replayer: TailReplayer::with_decoder(consumer, decoder, config.replay),
        })
    }

    pub fn namer(&self) -> &TopicNamer {
        &self.namer
    }

    /// Resolve `specifier` against the current topology. No bus I/O.
    pub async fn resolve(&self, specifier: &str) -> Result<ResolvedTopics> {
        let specifier = Specifier::parse(specifier)?;
        let pipeline = specifier.pipeline();

        let topology = tokio::time::timeout(
            self.topology_timeout,
            self.topology
                .pipeline_status(pipeline, &self.subscriber_name),
        )
        .await
        .map_err(|_| {
            InspectError::Timeout(format!(
                "topology fetch for pipeline {pipeline} timed out after {:?}",
                self.topology_timeout
            ))
        })??;

        let resolved = resolve(&self.namer, &specifier, &topology)?;
        debug!(
            specifier = %specifier,
            topics = resolved.topics.len(),
            tensor = ?resolved.tensor,
            "resolved specifier"
        );
        Ok(resolved)
    }

    /// Resolve `specifier`, then replay `count` messages from the tail of each topic.
    pub async fn inspect<S: ReplaySink + ?Sized>(
        &mut self,
        specifier: &str,
        count: u64,
        sink: &mut S,
    ) -> Result<ReplaySummary> {
        let resolved = self.resolve(specifier).await?;
        info!(
            pipeline = %resolved.pipeline,
            topics = resolved.topics.len(),
            count,
            "inspecting pipeline"
        );
        self.replayer.replay(&resolved, count, sink).await
    }

    /// Give back the bus consumer without closing it.
    pub fn into_consumer(self) -> C {
        self.replayer.into_consumer()
    }
}
