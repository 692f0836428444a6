//! Basic fast-import example
//!
//! Builds a small stream in memory, serializes it, parses it back and
//! dumps what the parser understood.
//!
//! Run with: cargo run --example basic

use bytes::{Bytes, BytesMut};

use fastimport_core::{
    dump_str, write_stream, BlobCommand, Command, CommitCommand, FileCommand, FileList, Mode,
    TagCommand, TreePath, WhoWhen, WriteOptions,
};
use fastimport_protocol::ImportParser;

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("fast-import Basic Example\n");

    println!("=== Building commands ===\n");
    let commands = build_commands()?;
    for command in &commands {
        println!("  - {} at line {}", command.name(), command.lineno());
    }

    println!("\n=== Serialized stream ===\n");
    let mut buf = BytesMut::new();
    write_stream(commands.iter(), &WriteOptions::default(), &mut buf)?;
    let stream = buf.freeze();
    print!("{}", String::from_utf8_lossy(&stream));

    println!("=== Parsed back ===\n");
    for result in ImportParser::new(&stream[..]) {
        let command = result?;
        println!("{}", dump_str(&command, None, true));
    }

    Ok(())
}

fn build_commands() -> anyhow::Result<Vec<Command>> {
    let author = WhoWhen::new("Jane Doe", "jane@example.com", 1_321_517_344, -21_600);

    let blob = BlobCommand {
        mark: Some("1".to_string()),
        data: Bytes::from_static(b"Hello, world!\n"),
        lineno: 0,
    };

    let files = vec![
        FileCommand::Modify {
            path: TreePath::new("README")?,
            mode: Mode::Regular,
            dataref: Some(":1".to_string()),
            data: None,
        },
        FileCommand::Modify {
            path: TreePath::new("bin/run.sh")?,
            mode: Mode::Executable,
            dataref: None,
            data: Some(Bytes::from_static(b"#!/bin/sh\necho hi\n")),
        },
    ];

    let commit = CommitCommand {
        ref_name: "refs/heads/main".to_string(),
        mark: Some("2".to_string()),
        author: Some(author.clone()),
        more_authors: Vec::new(),
        committer: author.clone(),
        message: Some(Bytes::from_static(b"initial import\n")),
        from: None,
        merges: Vec::new(),
        properties: Default::default(),
        files: FileList::reusable(files),
        lineno: 0,
    };

    let tag = TagCommand {
        id: "v1.0".to_string(),
        from: Some(":2".to_string()),
        tagger: Some(author),
        message: Some(Bytes::from_static(b"first release\n")),
        lineno: 0,
    };

    Ok(vec![
        Command::Blob(blob),
        Command::Commit(commit),
        Command::Tag(tag),
    ])
}
