//! Parsing side of the fast-import protocol
//!
//! This crate turns a byte stream in the `git fast-import` format into
//! the command values defined in `fastimport-core`, and dispatches them
//! to pluggable processors. The shape of a stream:
//!
//! ```text
//! stream   ::= command*
//! command  ::= "blob" LF mark? data
//!            | "checkpoint" LF
//!            | "commit" SP ref LF mark? author* committer data?
//!              from? merge* property* filecmd*
//!            | "feature" SP name ("=" value)? LF
//!            | "progress" SP? text LF
//!            | "reset" SP ref LF from?
//!            | "tag" SP name LF from? tagger? data?
//! data     ::= "data" SP count LF raw
//!            | "data" SP "<<" delim LF line* delim LF
//! who_when ::= name? SP? "<" email ">" SP date
//! filecmd  ::= "M" SP mode SP (dataref | "inline") SP path LF data?
//!            | "D" SP path LF
//!            | "C" SP path SP path LF
//!            | "R" SP path SP path LF
//!            | "deleteall" LF
//! ```
//!
//! Line-oriented reading with pushback lives in [`reader`], date handling
//! in [`dates`], the parser itself in [`parser`] and the consumer trait in
//! [`processor`].

pub mod dates;
pub mod error;
pub mod parser;
pub mod processor;
pub mod reader;

pub use dates::{system_clock, Clock, DateFormat};
pub use error::{ParseError, ParseResult};
pub use parser::{unquote_c_string, ImportParser};
pub use processor::ImportProcessor;
pub use reader::StreamReader;
