use std::fmt;

use crate::error::ResolveError;
use crate::topic::{Direction, EntityKind, TopicNamer, SEPARATOR};
use crate::topology::PipelineTopology;

/// Operator-typed dotted specifier, split into its positional segments.
///
/// Arity alone decides the interpretation:
///
/// | segments | meaning |
/// |---|---|
/// | `pipeline` | every step's inputs and outputs, then the pipeline's own topics |
/// | `pipeline.inputs` / `pipeline.outputs` | the pipeline-level topic |
/// | `pipeline.step` | the step's inputs and outputs |
/// | `pipeline.step.direction` | one step topic |
/// | `pipeline.step.direction.tensor` | one step topic, filtered to one tensor |
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Specifier {
    Pipeline {
        pipeline: String,
    },
    PipelineOrStep {
        pipeline: String,
        token: String,
    },
    StepDirection {
        pipeline: String,
        step: String,
        direction: String,
    },
    StepTensor {
        pipeline: String,
        step: String,
        direction: String,
        tensor: String,
    },
}

impl Specifier {
    /// Split a specifier on `.`. Fails on 5+ segments or an empty pipeline name.
    pub fn parse(raw: &str) -> Result<Self, ResolveError> {
        let parts: Vec<&str> = raw.split(SEPARATOR).collect();
        if parts[0].is_empty() {
            return Err(ResolveError::EmptyPipelineName);
        }
        let owned = |i: usize| parts[i].to_string();
        match parts.len() {
            1 => Ok(Specifier::Pipeline { pipeline: owned(0) }),
            2 => Ok(Specifier::PipelineOrStep {
                pipeline: owned(0),
                token: owned(1),
            }),
            3 => Ok(Specifier::StepDirection {
                pipeline: owned(0),
                step: owned(1),
                direction: owned(2),
            }),
            4 => Ok(Specifier::StepTensor {
                pipeline: owned(0),
                step: owned(1),
                direction: owned(2),
                tensor: owned(3),
            }),
            _ => Err(ResolveError::InvalidSpecifier {
                specifier: raw.to_string(),
            }),
        }
    }

    pub fn pipeline(&self) -> &str {
        match self {
            Specifier::Pipeline { pipeline }
            | Specifier::PipelineOrStep { pipeline, .. }
            | Specifier::StepDirection { pipeline, .. }
            | Specifier::StepTensor { pipeline, .. } => pipeline,
        }
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Specifier::Pipeline { pipeline } => write!(f, "{pipeline}"),
            Specifier::PipelineOrStep { pipeline, token } => write!(f, "{pipeline}.{token}"),
            Specifier::StepDirection {
                pipeline,
                step,
                direction,
            } => write!(f, "{pipeline}.{step}.{direction}"),
            Specifier::StepTensor {
                pipeline,
                step,
                direction,
                tensor,
            } => write!(f, "{pipeline}.{step}.{direction}.{tensor}"),
        }
    }
}

/// A physical topic together with its direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTopic {
    pub topic: String,
    pub direction: Direction,
}

/// Topics denoted by a specifier, in visit order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTopics {
    pub pipeline: String,
    pub topics: Vec<ResolvedTopic>,
    /// Client-side projection: only tensors with this name are emitted.
    /// Never part of the topic name.
    pub tensor: Option<String>,
}

impl ResolvedTopics {
    pub fn topic_names(&self) -> Vec<&str> {
        self.topics.iter().map(|t| t.topic.as_str()).collect()
    }
}

/// Resolve `specifier` against the latest version of `topology`.
///
/// Uses the namer's namespace regardless of where the pipeline actually runs.
pub fn resolve(
    namer: &TopicNamer,
    specifier: &Specifier,
    topology: &PipelineTopology,
) -> Result<ResolvedTopics, ResolveError> {
    let latest = topology.latest_version()?;
    let pipeline = specifier.pipeline().to_string();

    let model = |step: &str, direction: Direction| ResolvedTopic {
        topic: namer.name(EntityKind::Model, step, direction, None),
        direction,
    };
    let pipeline_topic = |direction: Direction| ResolvedTopic {
        topic: namer.name(EntityKind::Pipeline, &pipeline, direction, None),
        direction,
    };
    let require_step = |step: &str| {
        if latest.has_step(step) {
            Ok(())
        } else {
            Err(ResolveError::StepNotFound {
                step: step.to_string(),
                pipeline: pipeline.clone(),
            })
        }
    };
    let parse_direction = |token: &str| {
        token
            .parse::<Direction>()
            .map_err(|_| ResolveError::InvalidDirection {
                token: token.to_string(),
            })
    };

    let (topics, tensor) = match specifier {
        Specifier::Pipeline { .. } => {
            let mut topics = Vec::with_capacity(latest.steps.len() * 2 + 2);
            for step in &latest.steps {
                topics.push(model(&step.name, Direction::Inputs));
                topics.push(model(&step.name, Direction::Outputs));
            }
            topics.push(pipeline_topic(Direction::Inputs));
            topics.push(pipeline_topic(Direction::Outputs));
            (topics, None)
        }
        Specifier::PipelineOrStep { token, .. } => match token.parse::<Direction>() {
            Ok(direction) => (vec![pipeline_topic(direction)], None),
            Err(()) => {
                require_step(token)?;
                (
                    vec![
                        model(token, Direction::Inputs),
                        model(token, Direction::Outputs),
                    ],
                    None,
                )
            }
        },
        Specifier::StepDirection {
            step, direction, ..
        } => {
            require_step(step)?;
            let direction = parse_direction(direction)?;
            (vec![model(step, direction)], None)
        }
        Specifier::StepTensor {
            step,
            direction,
            tensor,
            ..
        } => {
            require_step(step)?;
            let direction = parse_direction(direction)?;
            (vec![model(step, direction)], Some(tensor.clone()))
        }
    };

    Ok(ResolvedTopics {
        pipeline,
        topics,
        tensor,
    })
}
