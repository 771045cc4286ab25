pub mod bus;
pub mod envelope;
pub mod error;
pub mod inspector;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod replay;
pub mod sources;
pub mod specifier;
pub mod topic;
pub mod topology;

pub use bus::{BusConsumer, BusMessage, MemoryBus, PollEvent};
pub use envelope::{
    Envelope, EnvelopeDecoder, InferInputTensor, InferOutputTensor, InferTensorContents,
    ModelInferRequest, ModelInferResponse, ProtobufDecoder,
};
pub use error::{BusError, DecodeError, InspectError, ResolveError, Result, TopicError};
pub use inspector::{Inspector, InspectorConfig};
#[cfg(feature = "kafka")]
pub use kafka::{KafkaConfig, KafkaConsumer};
pub use replay::{ReplayConfig, ReplayItem, ReplaySink, ReplaySummary, TailReplayer, TopicSummary};
pub use sources::resolve_sources;
pub use specifier::{resolve, ResolvedTopic, ResolvedTopics, Specifier};
pub use topic::{
    is_separator_free, Direction, EntityKind, TopicDescriptor, TopicNamer, DEFAULT_NAMESPACE,
    SELDON_PREFIX,
};
pub use topology::{
    FileTopologySource, PipelineStep, PipelineTopology, PipelineVersion, StaticTopologySource,
    TopologySource,
};
