/// Errors from topic naming.
#[derive(Debug, thiserror::Error)]
pub enum TopicError {
    #[error("{field} '{value}' must not contain the '.' separator")]
    SeparatorInName { field: &'static str, value: String },
}

/// Errors raised while resolving a specifier against pipeline topology.
///
/// All of these are raised before any bus I/O begins.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("failed to find step with name {step} in pipeline {pipeline}")]
    StepNotFound { step: String, pipeline: String },
    #[error("invalid direction '{token}': need to specify either inputs or outputs for a step")]
    InvalidDirection { token: String },
    #[error("bad pipeline specifier '{specifier}'")]
    InvalidSpecifier { specifier: String },
    #[error("pipeline specifier has an empty pipeline name")]
    EmptyPipelineName,
    #[error("pipeline {pipeline} not found")]
    PipelineNotFound { pipeline: String },
    #[error("pipeline {pipeline} has no topology versions")]
    NoTopologyVersions { pipeline: String },
}

/// Errors decoding an inference envelope or normalizing its raw contents.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("protobuf decode failed: {0}")]
    Protobuf(#[from] prost::DecodeError),
    #[error("envelope carries {raw} raw content entries for {tensors} tensors")]
    RawContentsMismatch { raw: usize, tensors: usize },
    #[error("tensor {tensor}: malformed raw contents: {reason}")]
    MalformedRawContents { tensor: String, reason: String },
    #[error("tensor {tensor}: unsupported datatype {datatype} for raw contents")]
    UnsupportedDatatype { tensor: String, datatype: String },
}

/// Errors from the message bus client.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("metadata fetch failed for topic {topic}: {reason}")]
    Metadata { topic: String, reason: String },
    #[error("topic {0} does not exist")]
    UnknownTopic(String),
    #[error("partition assignment failed for topic {topic}: {reason}")]
    Assign { topic: String, reason: String },
    #[error("bus client error: {0}")]
    Client(String),
}

/// Top-level inspection error.
#[derive(Debug, thiserror::Error)]
pub enum InspectError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("topic error: {0}")]
    Topic(#[from] TopicError),
    #[error("resolve error: {0}")]
    Resolve(#[from] ResolveError),
    #[error("decode error on topic {topic}: {source}")]
    Decode {
        topic: String,
        #[source]
        source: DecodeError,
    },
    #[error("bus error: {0}")]
    Bus(#[from] BusError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, InspectError>;
