use std::time::Duration;

use async_trait::async_trait;
use prost::Message;

use seldon_topic_inspect::{
    BusConsumer, BusError, InspectError, Inspector, InspectorConfig, MemoryBus,
    ModelInferResponse, PipelineStep, PipelineTopology, PipelineVersion, PollEvent,
    ReplayConfig, ReplayItem, ReplaySink, ResolveError, ResolvedTopic, StaticTopologySource,
    TopologySource,
};

/// Bus that fails the test if it is touched at all.
struct UntouchableBus;

#[async_trait]
impl BusConsumer for UntouchableBus {
    async fn partitions(&mut self, topic: &str, _timeout: Duration) -> Result<Vec<i32>, BusError> {
        panic!("bus metadata fetched for {topic} before resolution succeeded");
    }

    fn assign_tail(&mut self, topic: &str, _: &[i32], _: u64) -> Result<(), BusError> {
        panic!("partitions of {topic} assigned before resolution succeeded");
    }

    async fn poll(&mut self, _wait: Duration) -> Option<PollEvent> {
        panic!("bus polled before resolution succeeded");
    }
}

/// Control plane that never answers in time.
struct SlowTopology;

#[async_trait]
impl TopologySource for SlowTopology {
    async fn pipeline_status(
        &self,
        _pipeline: &str,
        _subscriber: &str,
    ) -> Result<PipelineTopology, InspectError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Err(InspectError::Connection("unreachable".into()))
    }
}

/// Records topic headers and items as they arrive.
#[derive(Default)]
struct RecordingSink {
    topics: Vec<String>,
    items: Vec<(String, ReplayItem)>,
}

impl ReplaySink for RecordingSink {
    fn begin_topic(&mut self, topic: &ResolvedTopic) -> seldon_topic_inspect::Result<()> {
        self.topics.push(topic.topic.clone());
        Ok(())
    }

    fn emit(&mut self, topic: &ResolvedTopic, item: ReplayItem) -> seldon_topic_inspect::Result<()> {
        self.items.push((topic.topic.clone(), item));
        Ok(())
    }
}

fn make_source() -> StaticTopologySource {
    StaticTopologySource::new(vec![PipelineTopology {
        name: "p1".into(),
        versions: vec![PipelineVersion {
            version: 3,
            steps: vec![
                PipelineStep {
                    name: "a".into(),
                    inputs: vec![],
                },
                PipelineStep {
                    name: "b".into(),
                    inputs: vec!["a.outputs".into()],
                },
            ],
        }],
    }])
}

fn make_config() -> InspectorConfig {
    InspectorConfig {
        topology_timeout: Duration::from_secs(2),
        replay: ReplayConfig {
            deadline: Duration::from_secs(1),
            poll_wait: Duration::from_millis(50),
            metadata_timeout: Duration::from_secs(1),
        },
        ..Default::default()
    }
}

fn response(model: &str) -> Vec<u8> {
    ModelInferResponse {
        model_name: model.into(),
        ..Default::default()
    }
    .encode_to_vec()
}

#[tokio::test(start_paused = true)]
async fn full_pipeline_trace_visits_every_topic() {
    let mut bus = MemoryBus::new();
    for topic in [
        "seldon.default.model.a.inputs",
        "seldon.default.model.b.inputs",
        "seldon.default.pipeline.p1.inputs",
    ] {
        bus.create_topic(topic, 1);
    }
    bus.produce("seldon.default.model.a.outputs", 0, response("a"));
    bus.produce("seldon.default.model.b.outputs", 0, response("b"));
    bus.produce("seldon.default.pipeline.p1.outputs", 0, response("p1"));

    let mut inspector = Inspector::new(make_config(), make_source(), bus).unwrap();
    let mut sink = RecordingSink::default();
    let summary = inspector.inspect("p1", 1, &mut sink).await.unwrap();

    assert_eq!(
        sink.topics,
        vec![
            "seldon.default.model.a.inputs",
            "seldon.default.model.a.outputs",
            "seldon.default.model.b.inputs",
            "seldon.default.model.b.outputs",
            "seldon.default.pipeline.p1.inputs",
            "seldon.default.pipeline.p1.outputs",
        ]
    );
    assert_eq!(summary.total_seen(), 3);
    let models: Vec<&str> = sink
        .items
        .iter()
        .map(|(_, item)| match item {
            ReplayItem::Response(res) => res.model_name.as_str(),
            other => panic!("expected response, got {other:?}"),
        })
        .collect();
    assert_eq!(models, vec!["a", "b", "p1"]);
}

#[tokio::test]
async fn resolution_errors_precede_bus_io() {
    let mut inspector = Inspector::new(make_config(), make_source(), UntouchableBus).unwrap();
    let mut sink = RecordingSink::default();

    for (raw, check) in [
        ("p1.z", "StepNotFound"),
        ("p1.a.sideways", "InvalidDirection"),
        ("p1.a.inputs.t.x", "InvalidSpecifier"),
        ("nope", "PipelineNotFound"),
    ] {
        let err = inspector.inspect(raw, 1, &mut sink).await.unwrap_err();
        let ok = match (&err, check) {
            (InspectError::Resolve(ResolveError::StepNotFound { .. }), "StepNotFound") => true,
            (InspectError::Resolve(ResolveError::InvalidDirection { .. }), "InvalidDirection") => {
                true
            }
            (InspectError::Resolve(ResolveError::InvalidSpecifier { .. }), "InvalidSpecifier") => {
                true
            }
            (InspectError::Resolve(ResolveError::PipelineNotFound { .. }), "PipelineNotFound") => {
                true
            }
            _ => false,
        };
        assert!(ok, "{raw}: expected {check}, got {err:?}");
    }
    assert!(sink.topics.is_empty());
}

#[tokio::test(start_paused = true)]
async fn topology_fetch_times_out() {
    let mut inspector = Inspector::new(make_config(), SlowTopology, UntouchableBus).unwrap();
    let mut sink = RecordingSink::default();
    let err = inspector.inspect("p1", 1, &mut sink).await.unwrap_err();
    assert!(matches!(err, InspectError::Timeout(_)), "got {err:?}");
}

#[tokio::test]
async fn resolve_uses_configured_namespace() {
    let config = InspectorConfig {
        namespace: "staging".into(),
        ..make_config()
    };
    let inspector = Inspector::new(config, make_source(), UntouchableBus).unwrap();
    let resolved = inspector.resolve("p1.b.outputs.score").await.unwrap();
    assert_eq!(
        resolved.topic_names(),
        vec!["seldon.staging.model.b.outputs"]
    );
    assert_eq!(resolved.tensor.as_deref(), Some("score"));
}

#[tokio::test]
async fn bad_namespace_rejected() {
    let config = InspectorConfig {
        namespace: "a.b".into(),
        ..make_config()
    };
    assert!(matches!(
        Inspector::new(config, make_source(), UntouchableBus),
        Err(InspectError::Topic(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn decode_error_surfaces_topic() {
    let mut bus = MemoryBus::new();
    bus.produce("seldon.default.model.a.outputs", 0, vec![0x0a, 0xff]);
    let mut inspector = Inspector::new(make_config(), make_source(), bus).unwrap();
    let mut sink = RecordingSink::default();

    let err = inspector.inspect("p1.a.outputs", 5, &mut sink).await.unwrap_err();
    assert!(
        err.to_string()
            .contains("decode error on topic seldon.default.model.a.outputs"),
        "got: {err}"
    );
    assert!(sink.items.is_empty());

    // The consumer is handed back for reuse or disposal.
    let _bus: MemoryBus = inspector.into_consumer();
}
