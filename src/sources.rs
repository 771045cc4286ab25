use crate::topic::TopicNamer;

/// Compute the topics a pipeline step consumes from.
///
/// Each raw input reference (`model`, `model.direction` or
/// `model.direction.tensor`) becomes a model topic with the reference appended
/// verbatim; order and count are preserved. A step with no declared inputs is
/// the pipeline's entry step and reads the pipeline inputs topic.
///
/// References are trusted, not validated, and the control plane is never
/// contacted.
pub fn resolve_sources<S: AsRef<str>>(
    namer: &TopicNamer,
    raw_inputs: &[S],
    pipeline: &str,
) -> Vec<String> {
    if raw_inputs.is_empty() {
        return vec![namer.pipeline_inputs_topic(pipeline)];
    }
    raw_inputs
        .iter()
        .map(|reference| namer.model_topic(reference.as_ref()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn misc_inputs() {
        let namer = TopicNamer::new("default").unwrap();
        let sources = resolve_sources(&namer, &["a", "b.inputs", "c.inputs.t1"], "p1");
        assert_eq!(
            sources,
            vec![
                "seldon.default.model.a",
                "seldon.default.model.b.inputs",
                "seldon.default.model.c.inputs.t1",
            ]
        );
    }

    #[test]
    fn no_inputs_reads_pipeline_inputs() {
        let namer = TopicNamer::new("ns1").unwrap();
        let sources = resolve_sources::<&str>(&namer, &[], "p1");
        assert_eq!(sources, vec!["seldon.ns1.pipeline.p1.inputs"]);
    }

    #[test]
    fn order_and_duplicates_preserved() {
        let namer = TopicNamer::new("default").unwrap();
        let inputs = vec!["z".to_string(), "a.outputs".to_string(), "z".to_string()];
        let sources = resolve_sources(&namer, &inputs, "p1");
        assert_eq!(sources.len(), 3);
        assert_eq!(sources[0], "seldon.default.model.z");
        assert_eq!(sources[1], "seldon.default.model.a.outputs");
        assert_eq!(sources[2], sources[0]);
    }
}
