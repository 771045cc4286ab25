use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TopicError;

/// Fixed prefix of every Seldon topic on the bus.
pub const SELDON_PREFIX: &str = "seldon";
/// Namespace used when none is configured.
pub const DEFAULT_NAMESPACE: &str = "default";
/// Separator joining topic segments.
pub const SEPARATOR: char = '.';

/// Kind of entity a topic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Model,
    Pipeline,
}

/// Flow direction of a topic relative to its entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Inputs,
    Outputs,
}

impl EntityKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            EntityKind::Model => "model",
            EntityKind::Pipeline => "pipeline",
        }
    }
}

impl Direction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Direction::Inputs => "inputs",
            Direction::Outputs => "outputs",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "model" => Ok(EntityKind::Model),
            "pipeline" => Ok(EntityKind::Pipeline),
            _ => Err(()),
        }
    }
}

impl FromStr for Direction {
    type Err = ();

    /// Case-sensitive: only `inputs` and `outputs` are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inputs" => Ok(Direction::Inputs),
            "outputs" => Ok(Direction::Outputs),
            _ => Err(()),
        }
    }
}

/// Structured form of a physical topic name.
///
/// `entity` and `tensor` are not checked for the separator; a name containing
/// `.` yields a topic that cannot be split back unambiguously. Callers that
/// create entities should reject such names with [`is_separator_free`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicDescriptor {
    pub kind: EntityKind,
    pub entity: String,
    pub direction: Direction,
    pub tensor: Option<String>,
}

impl TopicDescriptor {
    pub fn new(kind: EntityKind, entity: impl Into<String>, direction: Direction) -> Self {
        Self {
            kind,
            entity: entity.into(),
            direction,
            tensor: None,
        }
    }

    pub fn with_tensor(mut self, tensor: impl Into<String>) -> Self {
        self.tensor = Some(tensor.into());
        self
    }
}

/// Returns true if `name` can be used as a topic segment without ambiguity.
pub fn is_separator_free(name: &str) -> bool {
    !name.contains(SEPARATOR)
}

/// Builds topic names of the form
/// `<prefix>.<namespace>.<model|pipeline>.<entity>.<inputs|outputs>[.<tensor>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicNamer {
    prefix: String,
    namespace: String,
}

impl TopicNamer {
    /// Namer with the standard `seldon` prefix.
    pub fn new(namespace: impl Into<String>) -> Result<Self, TopicError> {
        Self::with_prefix(SELDON_PREFIX, namespace)
    }

    pub fn with_prefix(
        prefix: impl Into<String>,
        namespace: impl Into<String>,
    ) -> Result<Self, TopicError> {
        let prefix = prefix.into();
        let namespace = namespace.into();
        if !is_separator_free(&prefix) {
            return Err(TopicError::SeparatorInName {
                field: "prefix",
                value: prefix,
            });
        }
        if !is_separator_free(&namespace) {
            return Err(TopicError::SeparatorInName {
                field: "namespace",
                value: namespace,
            });
        }
        Ok(Self { prefix, namespace })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Name a topic from its parts.
    pub fn name(
        &self,
        kind: EntityKind,
        entity: &str,
        direction: Direction,
        tensor: Option<&str>,
    ) -> String {
        let mut topic = format!(
            "{}.{}.{}.{}.{}",
            self.prefix, self.namespace, kind, entity, direction
        );
        if let Some(tensor) = tensor {
            topic.push(SEPARATOR);
            topic.push_str(tensor);
        }
        topic
    }

    pub fn topic(&self, descriptor: &TopicDescriptor) -> String {
        self.name(
            descriptor.kind,
            &descriptor.entity,
            descriptor.direction,
            descriptor.tensor.as_deref(),
        )
    }

    pub fn model_inputs_topic(&self, model: &str) -> String {
        self.name(EntityKind::Model, model, Direction::Inputs, None)
    }

    pub fn model_outputs_topic(&self, model: &str) -> String {
        self.name(EntityKind::Model, model, Direction::Outputs, None)
    }

    pub fn pipeline_inputs_topic(&self, pipeline: &str) -> String {
        self.name(EntityKind::Pipeline, pipeline, Direction::Inputs, None)
    }

    pub fn pipeline_outputs_topic(&self, pipeline: &str) -> String {
        self.name(EntityKind::Pipeline, pipeline, Direction::Outputs, None)
    }

    /// Model topic with an author-supplied suffix appended verbatim.
    ///
    /// `reference` is one of `model`, `model.direction` or
    /// `model.direction.tensor` and is not parsed.
    pub fn model_topic(&self, reference: &str) -> String {
        format!(
            "{}.{}.{}.{}",
            self.prefix,
            self.namespace,
            EntityKind::Model,
            reference
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_model_and_pipeline_topics() {
        let namer = TopicNamer::new("default").unwrap();
        assert_eq!(namer.model_inputs_topic("a"), "seldon.default.model.a.inputs");
        assert_eq!(
            namer.model_outputs_topic("a"),
            "seldon.default.model.a.outputs"
        );
        assert_eq!(
            namer.pipeline_inputs_topic("p1"),
            "seldon.default.pipeline.p1.inputs"
        );
        assert_eq!(
            namer.pipeline_outputs_topic("p1"),
            "seldon.default.pipeline.p1.outputs"
        );
    }

    #[test]
    fn tensor_suffix_is_appended() {
        let namer = TopicNamer::new("ns1").unwrap();
        let d = TopicDescriptor::new(EntityKind::Model, "m", Direction::Outputs).with_tensor("t1");
        assert_eq!(namer.topic(&d), "seldon.ns1.model.m.outputs.t1");
    }

    #[test]
    fn custom_prefix() {
        let namer = TopicNamer::with_prefix("mesh", "prod").unwrap();
        assert_eq!(
            namer.name(EntityKind::Pipeline, "p", Direction::Inputs, None),
            "mesh.prod.pipeline.p.inputs"
        );
    }

    #[test]
    fn namespace_with_separator_rejected() {
        let err = TopicNamer::new("a.b").unwrap_err();
        assert!(matches!(
            err,
            TopicError::SeparatorInName {
                field: "namespace",
                ..
            }
        ));
        assert!(TopicNamer::with_prefix("sel.don", "default").is_err());
    }

    #[test]
    fn entity_names_are_not_checked() {
        // Ambiguous, but left to entity-creation-time validation.
        let namer = TopicNamer::new("default").unwrap();
        assert_eq!(
            namer.model_inputs_topic("a.b"),
            "seldon.default.model.a.b.inputs"
        );
        assert!(!is_separator_free("a.b"));
        assert!(is_separator_free("ab"));
    }

    #[test]
    fn direction_parsing_is_case_sensitive() {
        assert_eq!("inputs".parse::<Direction>(), Ok(Direction::Inputs));
        assert_eq!("outputs".parse::<Direction>(), Ok(Direction::Outputs));
        assert!("Inputs".parse::<Direction>().is_err());
        assert_eq!("pipeline".parse::<EntityKind>(), Ok(EntityKind::Pipeline));
    }
}
