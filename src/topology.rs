use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{InspectError, ResolveError};
use crate::sources::resolve_sources;
use crate::topic::TopicNamer;

/// Snapshot of a pipeline's topology history as served by the control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineTopology {
    pub name: String,
    /// Oldest first. Only the last version is authoritative.
    pub versions: Vec<PipelineVersion>,
}

/// One historical version of a pipeline's step graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineVersion {
    pub version: u32,
    pub steps: Vec<PipelineStep>,
}

/// A model-serving step inside a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStep {
    pub name: String,
    /// Raw upstream references, e.g. `a`, `b.outputs` or `c.outputs.t1`.
    #[serde(default)]
    pub inputs: Vec<String>,
}

impl PipelineTopology {
    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// The authoritative (most recent) version.
    pub fn latest_version(&self) -> Result<&PipelineVersion, ResolveError> {
        self.versions
            .last()
            .ok_or_else(|| ResolveError::NoTopologyVersions {
                pipeline: self.name.clone(),
            })
    }
}

impl PipelineVersion {
    pub fn has_step(&self, name: &str) -> bool {
        self.steps.iter().any(|step| step.name == name)
    }
}

impl PipelineStep {
    /// Topics this step consumes from when wired into `pipeline`.
    pub fn sources(&self, namer: &TopicNamer, pipeline: &str) -> Vec<String> {
        resolve_sources(namer, &self.inputs, pipeline)
    }
}

/// Read-only access to live pipeline topology.
///
/// Implementations must not cache across calls: each call reflects the
/// control plane's current state.
#[async_trait]
pub trait TopologySource: Send + Sync {
    /// Fetch the topology of `pipeline`, identifying the caller as `subscriber`.
    async fn pipeline_status(
        &self,
        pipeline: &str,
        subscriber: &str,
    ) -> Result<PipelineTopology, InspectError>;
}

/// In-memory set of topologies.
#[derive(Debug, Clone, Default)]
pub struct StaticTopologySource {
    pipelines: Vec<PipelineTopology>,
}

impl StaticTopologySource {
    pub fn new(pipelines: Vec<PipelineTopology>) -> Self {
        Self { pipelines }
    }

    fn lookup(&self, pipeline: &str) -> Result<PipelineTopology, InspectError> {
        self.pipelines
            .iter()
            .find(|p| p.name == pipeline)
            .cloned()
            .ok_or_else(|| {
                ResolveError::PipelineNotFound {
                    pipeline: pipeline.to_string(),
                }
                .into()
            })
    }
}

#[async_trait]
impl TopologySource for StaticTopologySource {
    async fn pipeline_status(
        &self,
        pipeline: &str,
        _subscriber: &str,
    ) -> Result<PipelineTopology, InspectError> {
        self.lookup(pipeline)
    }
}

/// Topology exported from the control plane as a JSON array of pipelines.
///
/// The file is re-read on every call.
#[derive(Debug, Clone)]
pub struct FileTopologySource {
    path: PathBuf,
}

impl FileTopologySource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TopologySource for FileTopologySource {
    async fn pipeline_status(
        &self,
        pipeline: &str,
        subscriber: &str,
    ) -> Result<PipelineTopology, InspectError> {
        let json = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            InspectError::Connection(format!(
                "cannot read topology from {}: {e}",
                self.path.display()
            ))
        })?;
        let pipelines: Vec<PipelineTopology> = serde_json::from_str(&json)?;
        debug!(
            path = %self.path.display(),
            pipelines = pipelines.len(),
            subscriber,
            "loaded topology snapshot"
        );
        StaticTopologySource::new(pipelines).lookup(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_topology() -> PipelineTopology {
        PipelineTopology {
            name: "p1".into(),
            versions: vec![
                PipelineVersion {
                    version: 1,
                    steps: vec![PipelineStep {
                        name: "old".into(),
                        inputs: vec![],
                    }],
                },
                PipelineVersion {
                    version: 2,
                    steps: vec![
                        PipelineStep {
                            name: "a".into(),
                            inputs: vec![],
                        },
                        PipelineStep {
                            name: "b".into(),
                            inputs: vec!["a.outputs.t1".into()],
                        },
                    ],
                },
            ],
        }
    }

    #[test]
    fn latest_version_is_last() {
        let t = make_topology();
        let v = t.latest_version().unwrap();
        assert_eq!(v.version, 2);
        assert!(v.has_step("a"));
        assert!(!v.has_step("old"));
    }

    #[test]
    fn no_versions_is_an_error() {
        let t = PipelineTopology {
            name: "p1".into(),
            versions: vec![],
        };
        assert!(matches!(
            t.latest_version(),
            Err(ResolveError::NoTopologyVersions { pipeline }) if pipeline == "p1"
        ));
    }

    #[test]
    fn step_sources_follow_inputs() {
        let t = make_topology();
        let namer = TopicNamer::new("default").unwrap();
        let v = t.latest_version().unwrap();
        assert_eq!(
            v.steps[0].sources(&namer, "p1"),
            vec!["seldon.default.pipeline.p1.inputs"]
        );
        assert_eq!(
            v.steps[1].sources(&namer, "p1"),
            vec!["seldon.default.model.a.outputs.t1"]
        );
    }

    #[test]
    fn json_roundtrip_defaults_inputs() {
        let json = r#"{"name":"p1","versions":[{"version":1,"steps":[{"name":"a"}]}]}"#;
        let t = PipelineTopology::from_json(json).unwrap();
        assert!(t.versions[0].steps[0].inputs.is_empty());
        let again = PipelineTopology::from_json(&t.to_json().unwrap()).unwrap();
        assert_eq!(again.name, "p1");
    }

    #[tokio::test]
    async fn static_source_unknown_pipeline() {
        let source = StaticTopologySource::new(vec![make_topology()]);
        assert!(source.pipeline_status("p1", "cli").await.is_ok());
        let err = source.pipeline_status("nope", "cli").await.unwrap_err();
        assert!(matches!(
            err,
            InspectError::Resolve(ResolveError::PipelineNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn file_source_missing_file_is_connection_error() {
        let source = FileTopologySource::new("/nonexistent/topology.json");
        let err = source.pipeline_status("p1", "cli").await.unwrap_err();
        assert!(matches!(err, InspectError::Connection(_)));
    }
}
