//! Command model and exact-byte serialization for git fast-import streams
//!
//! This crate provides:
//! - A closed union of the seven stream commands and five file sub-commands
//! - Reproducible wire serialization with per-call options
//! - Field-table driven debug dumps with binary payloads masked
//! - The stream extension registry
//! - Semantic errors shared with stream consumers

pub mod command;
pub mod dump;
pub mod error;
pub mod features;
pub mod wire;

pub use command::{
    BlobCommand, CheckpointCommand, Command, CommitCommand, FeatureCommand, FileCommand, FileList,
    FileListIter, Mode, ProgressCommand, ResetCommand, TagCommand, TreePath, WhoWhen,
};
pub use dump::{dump_file_str, dump_str};
pub use error::{Error, Result};
pub use features::check_feature_name;
pub use wire::{write_stream, WriteOptions};
