use std::io::Write;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use seldon_topic_inspect::{
    FileTopologySource, Inspector, InspectorConfig, KafkaConfig, KafkaConsumer, ReplayConfig,
    ReplayItem, ReplaySink, ResolvedTopic, DEFAULT_NAMESPACE,
};

#[derive(Parser)]
#[command(
    name = "pipeline-inspect",
    about = "Replay the tail of a pipeline's Kafka topics"
)]
struct Args {
    /// pipeline[.step[.inputs|outputs[.tensor]]] or pipeline.inputs|outputs
    specifier: String,

    /// Messages to replay from the end of each partition.
    #[arg(long, default_value = "1")]
    count: u64,

    /// JSON topology snapshot exported from the scheduler.
    #[arg(long)]
    topology: String,

    /// Kafka bootstrap servers.
    #[arg(long, default_value = "localhost:9092")]
    brokers: String,

    /// Namespace used for every topic, whatever the pipeline's own namespace.
    #[arg(long, default_value = DEFAULT_NAMESPACE)]
    namespace: String,

    /// Per-topic wall-clock budget in seconds.
    #[arg(long, default_value = "4")]
    deadline_secs: u64,
}

/// Prints a header per topic and one pretty JSON document per item.
struct PrintSink<W> {
    out: W,
}

impl<W: Write> ReplaySink for PrintSink<W> {
    fn begin_topic(&mut self, topic: &ResolvedTopic) -> seldon_topic_inspect::Result<()> {
        writeln!(self.out, "---\n{}", topic.topic)?;
        Ok(())
    }

    fn emit(&mut self, _topic: &ResolvedTopic, item: ReplayItem) -> seldon_topic_inspect::Result<()> {
        serde_json::to_writer_pretty(&mut self.out, &item)?;
        writeln!(self.out)?;
        Ok(())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let consumer = KafkaConsumer::new(&KafkaConfig {
        brokers: args.brokers.clone(),
        ..Default::default()
    })?;
    info!(group_id = consumer.group_id(), "observer consumer ready");

    let config = InspectorConfig {
        namespace: args.namespace,
        replay: ReplayConfig {
            deadline: Duration::from_secs(args.deadline_secs),
            ..Default::default()
        },
        ..Default::default()
    };
    let topology = FileTopologySource::new(&args.topology);
    let mut inspector = Inspector::new(config, topology, consumer)?;

    let mut sink = PrintSink {
        out: std::io::stdout().lock(),
    };
    let summary = inspector.inspect(&args.specifier, args.count, &mut sink).await?;
    info!(
        topics = summary.topics.len(),
        seen = summary.total_seen(),
        "inspection complete"
    );

    // Closing the Kafka client can stall for a long time; the process is about to exit.
    std::mem::forget(inspector.into_consumer());
    Ok(())
}
