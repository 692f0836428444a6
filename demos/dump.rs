//! Stream dump tool
//!
//! Reads a fast-import stream on stdin and prints one line per parsed
//! command. Statistics go to stderr so the dump itself stays clean.
//!
//! Run with: cargo run --example dump < stream.fi

use std::io;

use tracing::warn;

use fastimport_core::{
    check_feature_name, dump_str, BlobCommand, CheckpointCommand, CommitCommand, FeatureCommand,
    ProgressCommand, ResetCommand, TagCommand,
};
use fastimport_protocol::{ImportParser, ImportProcessor, ParseResult};

/// Counts what went past, flagging features this implementation does not
/// know about.
#[derive(Default)]
struct StatsProcessor {
    commands: u64,
    file_changes: u64,
    unknown_features: u64,
}

impl ImportProcessor for StatsProcessor {
    fn blob(&mut self, _command: &BlobCommand) -> ParseResult<()> {
        self.commands += 1;
        Ok(())
    }

    fn checkpoint(&mut self, _command: &CheckpointCommand) -> ParseResult<()> {
        self.commands += 1;
        Ok(())
    }

    fn commit(&mut self, command: &CommitCommand) -> ParseResult<()> {
        self.commands += 1;
        if let Some(count) = command.files.len() {
            self.file_changes += count as u64;
        }
        Ok(())
    }

    fn feature(&mut self, command: &FeatureCommand) -> ParseResult<()> {
        self.commands += 1;
        if check_feature_name(&command.name).is_err() {
            warn!(feature = %command.name, "stream uses an unrecognized feature");
            self.unknown_features += 1;
        }
        Ok(())
    }

    fn progress(&mut self, _command: &ProgressCommand) -> ParseResult<()> {
        self.commands += 1;
        Ok(())
    }

    fn reset(&mut self, _command: &ResetCommand) -> ParseResult<()> {
        self.commands += 1;
        Ok(())
    }

    fn tag(&mut self, _command: &TagCommand) -> ParseResult<()> {
        self.commands += 1;
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .init();

    // Parse command line args
    let args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|a| a == "-v" || a == "--verbose");
    let fields: Option<Vec<String>> = args
        .iter()
        .position(|a| a == "-f" || a == "--fields")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.split(',').map(|f| f.trim().to_string()).collect());
    let names: Option<Vec<&str>> = fields
        .as_ref()
        .map(|f| f.iter().map(|s| s.as_str()).collect());

    let stdin = io::stdin();
    let parser = ImportParser::new(stdin.lock());
    let dumped = parser.map(|result| {
        if let Ok(command) = &result {
            println!("{}", dump_str(command, names.as_deref(), verbose));
        }
        result
    });

    let mut stats = StatsProcessor::default();
    stats.process(dumped)?;

    eprintln!(
        "{} commands, {} file changes, {} unknown features",
        stats.commands, stats.file_changes, stats.unknown_features
    );

    Ok(())
}
