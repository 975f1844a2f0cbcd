use clap::{Arg, ArgAction, Command};

pub(super) const DEFAULT_RECORD_COUNT: usize = 25;

pub(super) fn root_cli() -> Command {
    Command::new("kinesis-producer")
        .about("Creates a Kinesis stream, waits for it to become active and publishes records")
        .long_about(
            "Creates a Kinesis stream, waits for it to become active and publishes records. \
             Settings come from KINESIS_* environment variables, the flags below override them.",
        )
        .arg(
            Arg::new("stream-name")
                .long("stream-name")
                .help("Stream to create and publish to, overrides KINESIS_STREAM_NAME")
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(String)),
        )
        .arg(
            Arg::new("shard-count")
                .long("shard-count")
                .help("Number of shards for a new stream, overrides KINESIS_SHARD_COUNT")
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(i32).range(1..)),
        )
        .arg(
            Arg::new("records")
                .long("records")
                .help("Number of demo records to publish")
                .action(ArgAction::Set)
                .default_value("25")
                .value_parser(clap::value_parser!(usize)),
        )
}
