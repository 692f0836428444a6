//! Stream command parser
//!
//! Pulls one top-level command at a time off a [`StreamReader`], using a
//! one line lookahead to find section boundaries. Blank lines and `#`
//! comments between commands are skipped; inside a commit, blank lines
//! between sections are tolerated.

use std::collections::BTreeMap;
use std::io::BufRead;

use bytes::Bytes;
use tracing::{debug, warn};

use fastimport_core::{
    BlobCommand, CheckpointCommand, Command, CommitCommand, FeatureCommand, FileCommand, Mode,
    ProgressCommand, ResetCommand, TagCommand, TreePath, WhoWhen,
};

use crate::dates::{system_clock, Clock, DateFormat};
use crate::error::{ParseError, ParseResult};
use crate::reader::StreamReader;

/// Streaming parser producing one [`Command`] per protocol command.
///
/// The who/when date style is detected from the first date seen and then
/// applied to the whole stream; [`ImportParser::with_date_format`] fixes
/// it up front instead.
pub struct ImportParser<R> {
    reader: StreamReader<R>,
    date_format: Option<DateFormat>,
    clock: Clock,
    done: bool,
}

impl<R: BufRead> ImportParser<R> {
    pub fn new(input: R) -> Self {
        Self {
            reader: StreamReader::new(input),
            date_format: None,
            clock: system_clock,
            done: false,
        }
    }

    /// Fix the who/when date style instead of auto-detecting it.
    pub fn with_date_format(mut self, format: DateFormat) -> Self {
        self.date_format = Some(format);
        self
    }

    /// Replace the clock that resolves the `now` sentinel.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Current input line number.
    pub fn lineno(&self) -> u64 {
        self.reader.lineno()
    }

    /// Pull the next top-level command, or `None` at end of stream.
    pub fn next_command(&mut self) -> ParseResult<Option<Command>> {
        loop {
            let line = match self.reader.next_line()? {
                Some(line) => line,
                None => return Ok(None),
            };
            if line.is_empty() || line.starts_with(b"#") {
                continue;
            }
            let lineno = self.reader.lineno();
            let (keyword, rest) = split_keyword(&line);
            let command = match keyword {
                b"blob" => self.parse_blob(lineno)?,
                b"checkpoint" => Command::Checkpoint(CheckpointCommand { lineno }),
                b"commit" => {
                    let ref_token = require_arg(rest, lineno, "commit", "ref")?;
                    self.parse_commit(ref_token, lineno)?
                }
                b"feature" => {
                    let info = require_arg(rest, lineno, "feature", "name")?;
                    self.parse_feature(info, lineno)?
                }
                b"progress" => Command::Progress(ProgressCommand {
                    message: Bytes::copy_from_slice(rest.unwrap_or_default()),
                    lineno,
                }),
                b"reset" => {
                    let ref_token = require_arg(rest, lineno, "reset", "ref")?;
                    self.parse_reset(ref_token, lineno)?
                }
                b"tag" => {
                    let name = require_arg(rest, lineno, "tag", "name")?;
                    self.parse_tag(name, lineno)?
                }
                _ => {
                    return Err(ParseError::InvalidCommand {
                        lineno,
                        command: String::from_utf8_lossy(keyword).into_owned(),
                    })
                }
            };
            debug!(command = command.name(), line = lineno, "parsed command");
            return Ok(Some(command));
        }
    }

    fn parse_blob(&mut self, lineno: u64) -> ParseResult<Command> {
        let mark = self.get_mark_if_any("blob")?;
        let data = self.get_data("blob", "data")?;
        Ok(Command::Blob(BlobCommand { mark, data, lineno }))
    }

    fn parse_commit(&mut self, ref_token: &[u8], lineno: u64) -> ParseResult<Command> {
        let ref_name = self.to_string_field(ref_token, "commit", "ref")?;
        let mark = self.get_mark_if_any("commit")?;
        let author = self.get_user_info_opt("commit", "author", false)?;
        let mut more_authors = Vec::new();
        while let Some(extra) = self.get_user_info_opt("commit", "author", false)? {
            more_authors.push(extra);
        }
        let committer = self.require_user_info("commit", "committer")?;
        let message = self.get_data_if_any("commit", "message")?;
        let from = self.get_from("commit")?;
        let mut merges = Vec::new();
        while let Some(merge_ids) = self.get_merge()? {
            let ids: Vec<&[u8]> = merge_ids
                .split(|&b| b == b' ')
                .filter(|id| !id.is_empty())
                .collect();
            if ids.len() > 1 {
                // git-fast-export has emitted several ids on a single merge line
                warn!(
                    line = self.reader.lineno(),
                    count = ids.len(),
                    "multiple ids on one merge line"
                );
            }
            for id in ids {
                merges.push(self.to_string_field(id, "commit", "merge")?);
            }
        }
        let mut properties = BTreeMap::new();
        while let Some((name, value)) = self.get_property()? {
            // a repeated property name keeps the last value
            properties.insert(name, value);
        }
        let files = self.parse_file_commands()?;
        Ok(Command::Commit(CommitCommand {
            ref_name,
            mark,
            author,
            more_authors,
            committer,
            message,
            from,
            merges,
            properties,
            files: files.into(),
            lineno,
        }))
    }

    fn parse_feature(&mut self, info: &[u8], lineno: u64) -> ParseResult<Command> {
        let (name, value) = match info.iter().position(|&b| b == b'=') {
            Some(index) => (&info[..index], Some(&info[index + 1..])),
            None => (info, None),
        };
        let name = self.to_string_field(name, "feature", "name")?;
        let value = match value {
            Some(value) => Some(self.to_string_field(value, "feature", "value")?),
            None => None,
        };
        Ok(Command::Feature(FeatureCommand {
            name,
            value,
            lineno,
        }))
    }

    fn parse_reset(&mut self, ref_token: &[u8], lineno: u64) -> ParseResult<Command> {
        let ref_name = self.to_string_field(ref_token, "reset", "ref")?;
        let from = self.get_from("reset")?;
        Ok(Command::Reset(ResetCommand {
            ref_name,
            from,
            lineno,
        }))
    }

    fn parse_tag(&mut self, name: &[u8], lineno: u64) -> ParseResult<Command> {
        let id = self.to_string_field(name, "tag", "name")?;
        let from = self.get_from("tag")?;
        let tagger = self.get_user_info_opt("tag", "tagger", true)?;
        let message = self.get_data_if_any("tag", "message")?;
        Ok(Command::Tag(TagCommand {
            id,
            from,
            tagger,
            message,
            lineno,
        }))
    }

    fn parse_file_commands(&mut self) -> ParseResult<Vec<FileCommand>> {
        let mut files = Vec::new();
        loop {
            let line = match self.reader.next_line()? {
                Some(line) => line,
                None => break,
            };
            if line.is_empty() || line.starts_with(b"#") {
                continue;
            }
            if line.starts_with(b"M ") {
                let file = self.parse_file_modify(&line[2..])?;
                files.push(file);
            } else if line.starts_with(b"D ") {
                let path = self.parse_path(&line[2..], "filedelete")?;
                files.push(FileCommand::Delete { path });
            } else if line.starts_with(b"C ") {
                let (src_path, dest_path) = self.parse_path_pair(&line[2..], "filecopy")?;
                files.push(FileCommand::Copy {
                    src_path,
                    dest_path,
                });
            } else if line.starts_with(b"R ") {
                let (old_path, new_path) = self.parse_path_pair(&line[2..], "filerename")?;
                files.push(FileCommand::Rename { old_path, new_path });
            } else if line.as_ref() == b"deleteall" {
                files.push(FileCommand::DeleteAll);
            } else {
                self.reader.push_line(line);
                break;
            }
        }
        Ok(files)
    }

    fn parse_file_modify(&mut self, info: &[u8]) -> ParseResult<FileCommand> {
        let lineno = self.reader.lineno();
        let mut parts = info.splitn(3, |&b| b == b' ');
        let mode_token = parts.next().unwrap_or_default();
        let missing = || ParseError::BadFormat {
            lineno,
            command: "filemodify",
            section: "path",
            text: String::from_utf8_lossy(info).into_owned(),
        };
        let dataref_token = parts.next().ok_or_else(missing)?;
        let path_token = parts.next().ok_or_else(missing)?;
        let mode = Mode::from_wire(mode_token).ok_or_else(|| ParseError::BadFormat {
            lineno,
            command: "filemodify",
            section: "mode",
            text: String::from_utf8_lossy(mode_token).into_owned(),
        })?;
        let path = self.parse_path(path_token, "filemodify")?;
        if mode.is_dir() && dataref_token == b"-" {
            Ok(FileCommand::Modify {
                path,
                mode,
                dataref: None,
                data: None,
            })
        } else if dataref_token == b"inline" {
            let data = self.get_data("filemodify", "data")?;
            Ok(FileCommand::Modify {
                path,
                mode,
                dataref: None,
                data: Some(data),
            })
        } else {
            let dataref = self.to_string_field(dataref_token, "filemodify", "dataref")?;
            Ok(FileCommand::Modify {
                path,
                mode,
                dataref: Some(dataref),
                data: None,
            })
        }
    }

    /// Interpret one path token, undoing quoting when present.
    fn parse_path(&mut self, token: &[u8], command: &'static str) -> ParseResult<TreePath> {
        let raw: Vec<u8> = if token.first() == Some(&b'"') {
            if token.len() < 2 || token.last() != Some(&b'"') {
                return Err(ParseError::BadFormat {
                    lineno: self.reader.lineno(),
                    command,
                    section: "path",
                    text: String::from_utf8_lossy(token).into_owned(),
                });
            }
            unquote_c_string(&token[1..token.len() - 1])
        } else {
            token.to_vec()
        };
        Ok(TreePath::new(raw)?)
    }

    /// Split a two-path token. A quoted first path ends at `" `; an
    /// unquoted one ends at the first space.
    fn parse_path_pair(
        &mut self,
        token: &[u8],
        command: &'static str,
    ) -> ParseResult<(TreePath, TreePath)> {
        let lineno = self.reader.lineno();
        let bad = || ParseError::BadFormat {
            lineno,
            command,
            section: "path",
            text: String::from_utf8_lossy(token).into_owned(),
        };
        let (first_raw, rest) = if token.first() == Some(&b'"') {
            match find_subslice(&token[1..], b"\" ") {
                Some(index) => (unquote_c_string(&token[1..1 + index]), &token[index + 3..]),
                None => return Err(bad()),
            }
        } else {
            match token.iter().position(|&b| b == b' ') {
                Some(index) => (token[..index].to_vec(), &token[index + 1..]),
                None => return Err(bad()),
            }
        };
        let first = TreePath::new(first_raw)?;
        let second = self.parse_path(rest, command)?;
        Ok((first, second))
    }

    fn get_mark_if_any(&mut self, command: &'static str) -> ParseResult<Option<String>> {
        let line = match self.reader.next_line()? {
            Some(line) => line,
            None => return Ok(None),
        };
        if line.starts_with(b"mark :") {
            let mark = self.to_string_field(&line[6..], command, "mark")?;
            return Ok(Some(mark));
        }
        self.reader.push_line(line);
        Ok(None)
    }

    /// Required data section. Both forms are accepted: `data <n>` followed
    /// by that many raw bytes, or `data <<DELIM` followed by lines up to
    /// the delimiter.
    fn get_data(&mut self, command: &'static str, section: &'static str) -> ParseResult<Bytes> {
        match self.reader.next_line()? {
            Some(line) if line.starts_with(b"data ") => {
                self.read_data_section(&line, command, section)
            }
            _ => Err(ParseError::MissingSection {
                lineno: self.reader.lineno(),
                command,
                section,
            }),
        }
    }

    fn get_data_if_any(
        &mut self,
        command: &'static str,
        section: &'static str,
    ) -> ParseResult<Option<Bytes>> {
        let line = match self.reader.next_line()? {
            Some(line) => line,
            None => return Ok(None),
        };
        if line.starts_with(b"data ") {
            let data = self.read_data_section(&line, command, section)?;
            Ok(Some(data))
        } else {
            self.reader.push_line(line);
            Ok(None)
        }
    }

    fn read_data_section(
        &mut self,
        line: &[u8],
        command: &'static str,
        section: &'static str,
    ) -> ParseResult<Bytes> {
        let header = &line[5..];
        if let Some(terminator) = header.strip_prefix(b"<<") {
            // delimited form; the exact-length form leaves the terminator
            // of its last line unconsumed, this one does not
            let body = self.reader.read_until(terminator)?;
            let mut data = Vec::with_capacity(body.len() + 1);
            data.extend_from_slice(&body);
            data.push(b'\n');
            Ok(Bytes::from(data))
        } else {
            let size = parse_usize(header).ok_or_else(|| ParseError::BadFormat {
                lineno: self.reader.lineno(),
                command,
                section,
                text: String::from_utf8_lossy(line).into_owned(),
            })?;
            self.reader.read_bytes(size)
        }
    }

    fn get_from(&mut self, command: &'static str) -> ParseResult<Option<String>> {
        let line = match self.next_nonblank_line()? {
            Some(line) => line,
            None => return Ok(None),
        };
        if line.starts_with(b"from ") {
            Ok(Some(self.to_string_field(&line[5..], command, "from")?))
        } else {
            self.reader.push_line(line);
            Ok(None)
        }
    }

    fn get_merge(&mut self) -> ParseResult<Option<Bytes>> {
        let line = match self.next_nonblank_line()? {
            Some(line) => line,
            None => return Ok(None),
        };
        if line.starts_with(b"merge ") {
            Ok(Some(line.slice(6..)))
        } else {
            self.reader.push_line(line);
            Ok(None)
        }
    }

    fn get_property(&mut self) -> ParseResult<Option<(String, Option<String>)>> {
        let line = match self.next_nonblank_line()? {
            Some(line) => line,
            None => return Ok(None),
        };
        if line.starts_with(b"property ") {
            let pair = self.read_property(&line[9..])?;
            Ok(Some(pair))
        } else {
            self.reader.push_line(line);
            Ok(None)
        }
    }

    /// Property payload: `<name>[ <byte-len> <value-start>]`. The length
    /// covers the whole value, so it may continue over following lines;
    /// the final line terminator is consumed but not part of the value.
    fn read_property(&mut self, info: &[u8]) -> ParseResult<(String, Option<String>)> {
        let bad = |lineno| ParseError::BadFormat {
            lineno,
            command: "commit",
            section: "property",
            text: String::from_utf8_lossy(info).into_owned(),
        };
        let mut parts = info.splitn(3, |&b| b == b' ');
        let name = self.to_string_field(parts.next().unwrap_or_default(), "commit", "property")?;
        let size_token = match parts.next() {
            Some(token) => token,
            None => return Ok((name, None)),
        };
        let size = parse_usize(size_token).ok_or_else(|| bad(self.reader.lineno()))?;
        let mut value = parts.next().unwrap_or_default().to_vec();
        if size > value.len() {
            let still = size - value.len();
            let rest = self.reader.read_bytes(still)?;
            value.push(b'\n');
            value.extend_from_slice(&rest[..still - 1]);
        }
        let value = String::from_utf8(value).map_err(|_| bad(self.reader.lineno()))?;
        Ok((name, Some(value)))
    }

    fn get_user_info_opt(
        &mut self,
        command: &'static str,
        section: &'static str,
        accept_just_who: bool,
    ) -> ParseResult<Option<WhoWhen>> {
        let line = match self.reader.next_line()? {
            Some(line) => line,
            None => return Ok(None),
        };
        if line.starts_with(section.as_bytes()) && line.get(section.len()) == Some(&b' ') {
            let who = self.who_when(&line[section.len() + 1..], command, section, accept_just_who)?;
            Ok(Some(who))
        } else {
            self.reader.push_line(line);
            Ok(None)
        }
    }

    fn require_user_info(
        &mut self,
        command: &'static str,
        section: &'static str,
    ) -> ParseResult<WhoWhen> {
        let line = match self.reader.next_line()? {
            Some(line) => line,
            None => {
                return Err(ParseError::MissingSection {
                    lineno: self.reader.lineno(),
                    command,
                    section,
                })
            }
        };
        if line.starts_with(section.as_bytes()) && line.get(section.len()) == Some(&b' ') {
            self.who_when(&line[section.len() + 1..], command, section, false)
        } else {
            Err(ParseError::MissingSection {
                lineno: self.reader.lineno(),
                command,
                section,
            })
        }
    }

    /// Interpret `[<name> ]<<email>> <date>`. The date starts after the
    /// last `"> "`; the name may be empty and may not contain `<`.
    fn who_when(
        &mut self,
        text: &[u8],
        command: &'static str,
        section: &'static str,
        accept_just_who: bool,
    ) -> ParseResult<WhoWhen> {
        let lineno = self.reader.lineno();
        if let Some(position) = rfind_subslice(text, b"> ") {
            if let Some((name, email)) = split_who(&text[..position]) {
                let date = trim_leading_spaces(&text[position + 2..]);
                let format = match self.date_format {
                    Some(format) => format,
                    None => {
                        let format = DateFormat::detect(date);
                        debug!(format = format.name(), line = lineno, "detected date format");
                        self.date_format = Some(format);
                        format
                    }
                };
                let (timestamp, tz_offset) = format.parse(date, lineno, self.clock)?;
                return Ok(WhoWhen {
                    name: Bytes::copy_from_slice(name),
                    email: Bytes::copy_from_slice(email),
                    timestamp,
                    tz_offset,
                });
            }
        }
        if accept_just_who && text.last() == Some(&b'>') {
            if let Some((name, email)) = split_who(&text[..text.len() - 1]) {
                // some exporters wrote tagger lines with no date at all
                warn!(line = lineno, "user section has no date, substituting the clock");
                return Ok(WhoWhen {
                    name: Bytes::copy_from_slice(name),
                    email: Bytes::copy_from_slice(email),
                    timestamp: (self.clock)(),
                    tz_offset: 0,
                });
            }
        }
        Err(ParseError::BadFormat {
            lineno,
            command,
            section,
            text: String::from_utf8_lossy(text).into_owned(),
        })
    }

    /// Next line skipping empty ones, or `None` at end of input.
    fn next_nonblank_line(&mut self) -> ParseResult<Option<Bytes>> {
        loop {
            match self.reader.next_line()? {
                Some(line) if line.is_empty() => continue,
                other => return Ok(other),
            }
        }
    }

    fn to_string_field(
        &self,
        bytes: &[u8],
        command: &'static str,
        section: &'static str,
    ) -> ParseResult<String> {
        match std::str::from_utf8(bytes) {
            Ok(text) => Ok(text.to_string()),
            Err(_) => Err(ParseError::BadFormat {
                lineno: self.reader.lineno(),
                command,
                section,
                text: String::from_utf8_lossy(bytes).into_owned(),
            }),
        }
    }
}

/// The iterator fuses after the first error or end of stream.
impl<R: BufRead> Iterator for ImportParser<R> {
    type Item = ParseResult<Command>;

    fn next(&mut self) -> Option<ParseResult<Command>> {
        if self.done {
            return None;
        }
        match self.next_command() {
            Ok(Some(command)) => Some(Ok(command)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Undo C-style escapes inside a quoted path token.
///
/// Handles `\n`, `\t`, `\r`, `\"`, `\\` and up to three octal digits.
/// Any other escape passes through with its backslash.
pub fn unquote_c_string(quoted: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(quoted.len());
    let mut i = 0;
    while i < quoted.len() {
        let byte = quoted[i];
        if byte != b'\\' || i + 1 == quoted.len() {
            out.push(byte);
            i += 1;
            continue;
        }
        i += 1;
        match quoted[i] {
            b'n' => {
                out.push(b'\n');
                i += 1;
            }
            b't' => {
                out.push(b'\t');
                i += 1;
            }
            b'r' => {
                out.push(b'\r');
                i += 1;
            }
            b'"' => {
                out.push(b'"');
                i += 1;
            }
            b'\\' => {
                out.push(b'\\');
                i += 1;
            }
            b'0'..=b'7' => {
                let mut value = 0u32;
                let mut digits = 0;
                while digits < 3 && i < quoted.len() && matches!(quoted[i], b'0'..=b'7') {
                    value = value * 8 + u32::from(quoted[i] - b'0');
                    i += 1;
                    digits += 1;
                }
                out.push(value as u8);
            }
            other => {
                out.push(b'\\');
                out.push(other);
                i += 1;
            }
        }
    }
    out
}

fn split_keyword(line: &[u8]) -> (&[u8], Option<&[u8]>) {
    match line.iter().position(|&b| b == b' ') {
        Some(index) => (&line[..index], Some(&line[index + 1..])),
        None => (line, None),
    }
}

fn require_arg<'a>(
    rest: Option<&'a [u8]>,
    lineno: u64,
    command: &'static str,
    section: &'static str,
) -> ParseResult<&'a [u8]> {
    rest.ok_or(ParseError::MissingSection {
        lineno,
        command,
        section,
    })
}

fn split_who(part: &[u8]) -> Option<(&[u8], &[u8])> {
    let open = part.iter().position(|&b| b == b'<')?;
    let name = trim_trailing_spaces(&part[..open]);
    Some((name, &part[open + 1..]))
}

fn trim_trailing_spaces(mut bytes: &[u8]) -> &[u8] {
    while let Some((&last, rest)) = bytes.split_last() {
        if last == b' ' || last == b'\t' {
            bytes = rest;
        } else {
            break;
        }
    }
    bytes
}

fn trim_leading_spaces(mut bytes: &[u8]) -> &[u8] {
    while let Some((&first, rest)) = bytes.split_first() {
        if first == b' ' || first == b'\t' {
            bytes = rest;
        } else {
            break;
        }
    }
    bytes
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn rfind_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}

fn parse_usize(token: &[u8]) -> Option<usize> {
    std::str::from_utf8(token).ok()?.trim().parse().ok()
}
