//! fast-import benchmark
//!
//! Generates a synthetic stream in memory and measures serialize and
//! parse throughput.
//!
//! Run with: cargo run --example benchmark --release

use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};

use fastimport_core::{
    write_stream, BlobCommand, Command, CommitCommand, FileCommand, FileList, Mode, TreePath,
    WhoWhen, WriteOptions,
};
use fastimport_protocol::ImportParser;

/// Benchmark configuration
struct BenchConfig {
    /// Number of commits in the synthetic stream
    commits: usize,
    /// File modifications per commit
    files_per_commit: usize,
    /// Size of each blob payload
    blob_size: usize,
}

/// Benchmark results
#[derive(Debug)]
struct BenchResults {
    name: String,
    bytes: usize,
    commands: usize,
    duration: Duration,
    mb_per_sec: f64,
    commands_per_sec: f64,
}

impl BenchResults {
    fn print(&self) {
        println!("\n╔══════════════════════════════════════════════════════════╗");
        println!("║  {} ", self.name);
        println!("╠══════════════════════════════════════════════════════════╣");
        println!("║  Stream size:       {:>12} bytes                  ║", self.bytes);
        println!("║  Commands:          {:>12}                        ║", self.commands);
        println!("║  Duration:          {:>12.2?}                      ║", self.duration);
        println!("║  Throughput:        {:>12.1} MB/s                  ║", self.mb_per_sec);
        println!("║  Command rate:      {:>12.0} cmds/sec              ║", self.commands_per_sec);
        println!("╚══════════════════════════════════════════════════════════╝");
    }
}

fn build_commands(config: &BenchConfig) -> anyhow::Result<Vec<Command>> {
    let who = WhoWhen::new("Benchmark Bot", "bench@example.com", 1_600_000_000, 0);
    let mut commands = Vec::with_capacity(config.commits * 2);

    for i in 0..config.commits {
        let blob_mark = i * 2 + 1;
        let commit_mark = i * 2 + 2;

        let payload = vec![b'a' + (i % 20) as u8; config.blob_size];
        commands.push(Command::Blob(BlobCommand {
            mark: Some(blob_mark.to_string()),
            data: Bytes::from(payload),
            lineno: 0,
        }));

        let mut files = Vec::with_capacity(config.files_per_commit);
        for j in 0..config.files_per_commit {
            files.push(FileCommand::Modify {
                path: TreePath::new(format!("dir{}/file{}.txt", i % 8, j).into_bytes())?,
                mode: Mode::Regular,
                dataref: Some(format!(":{}", blob_mark)),
                data: None,
            });
        }

        commands.push(Command::Commit(CommitCommand {
            ref_name: "refs/heads/main".to_string(),
            mark: Some(commit_mark.to_string()),
            author: None,
            more_authors: Vec::new(),
            committer: who.clone(),
            message: Some(Bytes::from(format!("synthetic commit {}\n", i))),
            from: if i > 0 {
                Some(format!(":{}", commit_mark - 2))
            } else {
                None
            },
            merges: Vec::new(),
            properties: Default::default(),
            files: FileList::reusable(files),
            lineno: 0,
        }));
    }

    Ok(commands)
}

fn bench_serialize(commands: &[Command]) -> anyhow::Result<(BenchResults, Bytes)> {
    let options = WriteOptions::default();
    let start = Instant::now();
    let mut buf = BytesMut::new();
    write_stream(commands.iter(), &options, &mut buf)?;
    let duration = start.elapsed();
    let stream = buf.freeze();

    let results = BenchResults {
        name: format!("SERIALIZE ({} commands)", commands.len()),
        bytes: stream.len(),
        commands: commands.len(),
        duration,
        mb_per_sec: stream.len() as f64 / 1_000_000.0 / duration.as_secs_f64(),
        commands_per_sec: commands.len() as f64 / duration.as_secs_f64(),
    };
    Ok((results, stream))
}

fn bench_parse(stream: &[u8]) -> anyhow::Result<BenchResults> {
    let start = Instant::now();
    let mut commands = 0usize;
    for result in ImportParser::new(stream) {
        result?;
        commands += 1;
    }
    let duration = start.elapsed();

    Ok(BenchResults {
        name: format!("PARSE ({} commands)", commands),
        bytes: stream.len(),
        commands,
        duration,
        mb_per_sec: stream.len() as f64 / 1_000_000.0 / duration.as_secs_f64(),
        commands_per_sec: commands as f64 / duration.as_secs_f64(),
    })
}

fn main() -> anyhow::Result<()> {
    println!();
    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║              FAST-IMPORT BENCHMARK                       ║");
    println!("╚══════════════════════════════════════════════════════════╝");
    println!();

    // Parse command line args
    let args: Vec<String> = std::env::args().collect();
    let commits: usize = args
        .iter()
        .position(|a| a == "-n" || a == "--commits")
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(10_000);

    let files_per_commit: usize = args
        .iter()
        .position(|a| a == "-f" || a == "--files")
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(4);

    let blob_size: usize = args
        .iter()
        .position(|a| a == "-s" || a == "--size")
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
        .unwrap_or(512);

    let config = BenchConfig {
        commits,
        files_per_commit,
        blob_size,
    };

    println!("Configuration:");
    println!("  Commits:          {}", config.commits);
    println!("  Files per commit: {}", config.files_per_commit);
    println!("  Blob size:        {} bytes", config.blob_size);

    let commands = build_commands(&config)?;

    let (serialize_results, stream) = bench_serialize(&commands)?;
    serialize_results.print();

    let parse_results = bench_parse(&stream)?;
    parse_results.print();

    // Sanity check: the parsed stream serializes back to the same bytes
    let reparsed: Vec<Command> = ImportParser::new(&stream[..])
        .collect::<Result<_, _>>()?;
    let mut buf = BytesMut::new();
    write_stream(reparsed.iter(), &WriteOptions::default(), &mut buf)?;
    if buf == stream {
        println!("\nRound-trip check: OK");
    } else {
        println!("\nRound-trip check: MISMATCH");
    }

    Ok(())
}
