//! Exact-byte serialization of commands
//!
//! Rendering is reproducible: data sections always use the exact-length
//! form, commit sections keep a fixed order, and commit properties are
//! emitted sorted by name. Commands do not end with a newline; stream
//! writers add the separator between commands.

use bytes::{BufMut, Bytes, BytesMut};

use crate::command::{
    BlobCommand, CheckpointCommand, Command, CommitCommand, FeatureCommand, FileCommand,
    ProgressCommand, ResetCommand, TagCommand, WhoWhen,
};
use crate::error::Result;

/// Per-call serialization switches.
#[derive(Debug, Clone, Copy)]
pub struct WriteOptions {
    /// Emit extension sections: extra author lines and property lines.
    pub use_features: bool,
    /// Materialize inline file contents after `M` lines.
    pub include_file_contents: bool,
    /// Append one space after a closing path quote, for git <= 1.5.4.3.
    pub legacy_quote_pad: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            use_features: true,
            include_file_contents: true,
            legacy_quote_pad: false,
        }
    }
}

impl Command {
    /// Encode the command to its wire bytes.
    pub fn encode(&self, options: &WriteOptions) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf, options)?;
        Ok(buf.freeze())
    }

    /// Encode the command, appending to an existing buffer.
    pub fn encode_into(&self, buf: &mut BytesMut, options: &WriteOptions) -> Result<()> {
        match self {
            Command::Blob(c) => c.encode_into(buf),
            Command::Checkpoint(c) => c.encode_into(buf),
            Command::Commit(c) => return c.encode_into(buf, options),
            Command::Feature(c) => c.encode_into(buf),
            Command::Progress(c) => c.encode_into(buf),
            Command::Reset(c) => c.encode_into(buf),
            Command::Tag(c) => c.encode_into(buf),
        }
        Ok(())
    }
}

/// Serialize commands as one stream, separated and terminated by newlines.
pub fn write_stream<'a, I>(commands: I, options: &WriteOptions, buf: &mut BytesMut) -> Result<()>
where
    I: IntoIterator<Item = &'a Command>,
{
    for command in commands {
        command.encode_into(buf, options)?;
        buf.put_u8(b'\n');
    }
    Ok(())
}

fn put_data_section(buf: &mut BytesMut, data: &[u8]) {
    buf.put_slice(b"data ");
    buf.put_slice(data.len().to_string().as_bytes());
    buf.put_u8(b'\n');
    buf.put_slice(data);
}

impl BlobCommand {
    /// Wire format: `blob\n[mark :<m>\n]data <n>\n<raw>`
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_slice(b"blob\n");
        if let Some(mark) = &self.mark {
            buf.put_slice(b"mark :");
            buf.put_slice(mark.as_bytes());
            buf.put_u8(b'\n');
        }
        put_data_section(buf, &self.data);
    }
}

impl CheckpointCommand {
    /// Wire format: `checkpoint`
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_slice(b"checkpoint");
    }
}

impl CommitCommand {
    /// Wire format: `commit <ref>` followed by the optional mark, author,
    /// committer, message, from, merge and property sections, then the
    /// file sub-commands, each section on its own line.
    pub fn encode_into(&self, buf: &mut BytesMut, options: &WriteOptions) -> Result<()> {
        buf.put_slice(b"commit ");
        buf.put_slice(self.ref_name.as_bytes());
        if let Some(mark) = &self.mark {
            buf.put_slice(b"\nmark :");
            buf.put_slice(mark.as_bytes());
        }
        if let Some(author) = &self.author {
            buf.put_slice(b"\nauthor ");
            format_who_when(buf, author);
            if options.use_features {
                for author in &self.more_authors {
                    buf.put_slice(b"\nauthor ");
                    format_who_when(buf, author);
                }
            }
        }
        buf.put_slice(b"\ncommitter ");
        format_who_when(buf, &self.committer);
        if let Some(message) = &self.message {
            buf.put_u8(b'\n');
            put_data_section(buf, message);
        }
        if let Some(from) = &self.from {
            buf.put_slice(b"\nfrom ");
            buf.put_slice(from.as_bytes());
        }
        for merge in &self.merges {
            buf.put_slice(b"\nmerge ");
            buf.put_slice(merge.as_bytes());
        }
        if options.use_features {
            for (name, value) in &self.properties {
                buf.put_u8(b'\n');
                format_property(buf, name, value.as_deref());
            }
        }
        for file in self.files.iter()? {
            buf.put_u8(b'\n');
            file.encode_into(buf, options);
        }
        Ok(())
    }
}

impl FeatureCommand {
    /// Wire format: `feature <name>[=<value>]`
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_slice(b"feature ");
        buf.put_slice(self.name.as_bytes());
        if let Some(value) = &self.value {
            buf.put_u8(b'=');
            buf.put_slice(value.as_bytes());
        }
    }
}

impl ProgressCommand {
    /// Wire format: `progress <message>`
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_slice(b"progress ");
        buf.put_slice(&self.message);
    }
}

impl ResetCommand {
    /// Wire format: `reset <ref>[\nfrom <id>\n]`
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_slice(b"reset ");
        buf.put_slice(self.ref_name.as_bytes());
        if let Some(from) = &self.from {
            buf.put_slice(b"\nfrom ");
            buf.put_slice(from.as_bytes());
            // The LF is optional per git-fast-import(1), but git up to
            // 1.5.4.3 requires it after a reset's from line.
            buf.put_u8(b'\n');
        }
    }
}

impl TagCommand {
    /// Wire format: `tag <name>` followed by the optional from, tagger and
    /// message sections, each on its own line.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_slice(b"tag ");
        buf.put_slice(self.id.as_bytes());
        if let Some(from) = &self.from {
            buf.put_slice(b"\nfrom ");
            buf.put_slice(from.as_bytes());
        }
        if let Some(tagger) = &self.tagger {
            buf.put_slice(b"\ntagger ");
            format_who_when(buf, tagger);
        }
        if let Some(message) = &self.message {
            buf.put_u8(b'\n');
            put_data_section(buf, message);
        }
    }
}

impl FileCommand {
    pub fn encode(&self, options: &WriteOptions) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode_into(&mut buf, options);
        buf.freeze()
    }

    pub fn encode_into(&self, buf: &mut BytesMut, options: &WriteOptions) {
        match self {
            FileCommand::Modify {
                path,
                mode,
                dataref,
                data,
            } => {
                buf.put_slice(b"M ");
                buf.put_slice(mode.as_wire().as_bytes());
                buf.put_u8(b' ');
                if mode.is_dir() {
                    buf.put_u8(b'-');
                } else if let Some(dataref) = dataref {
                    buf.put_slice(dataref.as_bytes());
                } else {
                    buf.put_slice(b"inline");
                }
                buf.put_u8(b' ');
                format_path(buf, path.as_bytes(), false, options.legacy_quote_pad);
                if !mode.is_dir() && dataref.is_none() && options.include_file_contents {
                    if let Some(data) = data {
                        buf.put_u8(b'\n');
                        put_data_section(buf, data);
                    }
                }
            }
            FileCommand::Delete { path } => {
                buf.put_slice(b"D ");
                format_path(buf, path.as_bytes(), false, options.legacy_quote_pad);
            }
            FileCommand::Copy {
                src_path,
                dest_path,
            } => {
                buf.put_slice(b"C ");
                format_path(buf, src_path.as_bytes(), true, options.legacy_quote_pad);
                buf.put_u8(b' ');
                format_path(buf, dest_path.as_bytes(), false, options.legacy_quote_pad);
            }
            FileCommand::Rename { old_path, new_path } => {
                buf.put_slice(b"R ");
                format_path(buf, old_path.as_bytes(), true, options.legacy_quote_pad);
                buf.put_u8(b' ');
                format_path(buf, new_path.as_bytes(), false, options.legacy_quote_pad);
            }
            FileCommand::DeleteAll => buf.put_slice(b"deleteall"),
        }
    }
}

/// Render a who/when section: `[<name> ]<<email>> <seconds> <+|->HHMM`.
pub fn format_who_when(buf: &mut BytesMut, who: &WhoWhen) {
    if !who.name.is_empty() {
        buf.put_slice(&who.name);
        buf.put_u8(b' ');
    }
    buf.put_u8(b'<');
    buf.put_slice(&who.email);
    buf.put_slice(b"> ");
    buf.put_slice(who.timestamp.to_string().as_bytes());
    buf.put_u8(b' ');
    let (sign, offset) = if who.tz_offset < 0 {
        ('-', -i64::from(who.tz_offset))
    } else {
        ('+', i64::from(who.tz_offset))
    };
    let hours = offset / 3600;
    let minutes = (offset / 60) % 60;
    buf.put_slice(format!("{}{:02}{:02}", sign, hours, minutes).as_bytes());
}

/// Render a commit property: `property <name>[ <byte-len> <value>]`.
///
/// The length header covers the whole value, so values may span lines.
pub fn format_property(buf: &mut BytesMut, name: &str, value: Option<&str>) {
    buf.put_slice(b"property ");
    buf.put_slice(name.as_bytes());
    if let Some(value) = value {
        buf.put_u8(b' ');
        buf.put_slice(value.len().to_string().as_bytes());
        buf.put_u8(b' ');
        buf.put_slice(value.as_bytes());
    }
}

/// Render a path token, quoting it only when required.
///
/// Quoting is required for a newline anywhere, a leading double quote, or,
/// when `quote_spaces` is set, any space. Inside quotes the newline, the
/// backslash and the double quote are escaped.
pub fn format_path(buf: &mut BytesMut, path: &[u8], quote_spaces: bool, legacy_pad: bool) {
    let needs_quoting = path.contains(&b'\n')
        || path.first() == Some(&b'"')
        || (quote_spaces && path.contains(&b' '));
    if !needs_quoting {
        buf.put_slice(path);
        return;
    }
    buf.put_u8(b'"');
    for &byte in path {
        match byte {
            b'\n' => buf.put_slice(b"\\n"),
            b'\\' => buf.put_slice(b"\\\\"),
            b'"' => buf.put_slice(b"\\\""),
            _ => buf.put_u8(byte),
        }
    }
    buf.put_u8(b'"');
    if legacy_pad {
        // git up to 1.5.4.3 consumed one character too many after the quote
        buf.put_u8(b' ');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{FileList, Mode, TreePath};
    use std::collections::BTreeMap;

    fn who(name: &'static str, email: &'static str) -> WhoWhen {
        WhoWhen::new(name.as_bytes(), email.as_bytes(), 1234567890, -18000)
    }

    fn path(p: &'static [u8]) -> TreePath {
        TreePath::new(p).unwrap()
    }

    fn encode_who(w: &WhoWhen) -> BytesMut {
        let mut buf = BytesMut::new();
        format_who_when(&mut buf, w);
        buf
    }

    #[test]
    fn test_encode_blob() {
        let cmd = Command::Blob(BlobCommand {
            mark: Some("1".to_string()),
            data: Bytes::from_static(b"aaaa"),
            lineno: 1,
        });
        let encoded = cmd.encode(&WriteOptions::default()).unwrap();
        assert_eq!(encoded.as_ref(), b"blob\nmark :1\ndata 4\naaaa");

        let cmd = Command::Blob(BlobCommand {
            mark: None,
            data: Bytes::from_static(b"bbbbb"),
            lineno: 1,
        });
        let encoded = cmd.encode(&WriteOptions::default()).unwrap();
        assert_eq!(encoded.as_ref(), b"blob\ndata 5\nbbbbb");
    }

    #[test]
    fn test_encode_checkpoint() {
        let cmd = Command::Checkpoint(CheckpointCommand { lineno: 1 });
        let encoded = cmd.encode(&WriteOptions::default()).unwrap();
        assert_eq!(encoded.as_ref(), b"checkpoint");
    }

    #[test]
    fn test_encode_feature() {
        let cmd = Command::Feature(FeatureCommand {
            name: "whatever".to_string(),
            value: None,
            lineno: 1,
        });
        assert_eq!(
            cmd.encode(&WriteOptions::default()).unwrap().as_ref(),
            b"feature whatever"
        );

        let cmd = Command::Feature(FeatureCommand {
            name: "foo".to_string(),
            value: Some("bar".to_string()),
            lineno: 1,
        });
        assert_eq!(
            cmd.encode(&WriteOptions::default()).unwrap().as_ref(),
            b"feature foo=bar"
        );
    }

    #[test]
    fn test_encode_progress() {
        let cmd = Command::Progress(ProgressCommand {
            message: Bytes::from_static(b"completed"),
            lineno: 1,
        });
        assert_eq!(
            cmd.encode(&WriteOptions::default()).unwrap().as_ref(),
            b"progress completed"
        );
    }

    #[test]
    fn test_encode_reset() {
        let cmd = Command::Reset(ResetCommand {
            ref_name: "refs/heads/master".to_string(),
            from: None,
            lineno: 1,
        });
        assert_eq!(
            cmd.encode(&WriteOptions::default()).unwrap().as_ref(),
            b"reset refs/heads/master"
        );

        let cmd = Command::Reset(ResetCommand {
            ref_name: "refs/heads/master".to_string(),
            from: Some(":5".to_string()),
            lineno: 1,
        });
        assert_eq!(
            cmd.encode(&WriteOptions::default()).unwrap().as_ref(),
            b"reset refs/heads/master\nfrom :5\n"
        );
    }

    #[test]
    fn test_encode_tag() {
        let cmd = Command::Tag(TagCommand {
            id: "v1.0".to_string(),
            from: Some(":2".to_string()),
            tagger: Some(who("Joe", "joe@example.com")),
            message: Some(Bytes::from_static(b"release")),
            lineno: 1,
        });
        assert_eq!(
            cmd.encode(&WriteOptions::default()).unwrap().as_ref(),
            &b"tag v1.0\nfrom :2\ntagger Joe <joe@example.com> 1234567890 -0500\ndata 7\nrelease"[..]
        );
    }

    #[test]
    fn test_format_who_when() {
        let w = who("bugs bunny", "bugs@bunny.org");
        assert_eq!(
            encode_who(&w).as_ref(),
            b"bugs bunny <bugs@bunny.org> 1234567890 -0500"
        );

        let w = WhoWhen::new(&b""[..], &b"bugs@bunny.org"[..], 1234567890, 0);
        assert_eq!(encode_who(&w).as_ref(), b"<bugs@bunny.org> 1234567890 +0000");

        let w = WhoWhen::new(&b"A"[..], &b"a@b"[..], 0, 19800);
        assert_eq!(encode_who(&w).as_ref(), b"A <a@b> 0 +0530");
    }

    #[test]
    fn test_encode_commit_full() {
        let mut properties = BTreeMap::new();
        properties.insert("planet".to_string(), Some("world".to_string()));
        properties.insert("empty".to_string(), None);
        let cmd = Command::Commit(CommitCommand {
            ref_name: "refs/heads/master".to_string(),
            mark: Some("2".to_string()),
            author: Some(who("Fluffy", "fluffy@bunny.org")),
            more_authors: vec![who("Daffy", "daffy@duck.org")],
            committer: who("bugs bunny", "bugs@bunny.org"),
            message: Some(Bytes::from_static(b"initial import")),
            from: Some(":1".to_string()),
            merges: vec![":3".to_string()],
            properties,
            files: FileList::reusable(vec![FileCommand::Modify {
                path: path(b"README"),
                mode: Mode::Regular,
                dataref: None,
                data: Some(Bytes::from_static(b"hi")),
            }]),
            lineno: 1,
        });
        let expected: &[u8] = b"commit refs/heads/master\n\
            mark :2\n\
            author Fluffy <fluffy@bunny.org> 1234567890 -0500\n\
            author Daffy <daffy@duck.org> 1234567890 -0500\n\
            committer bugs bunny <bugs@bunny.org> 1234567890 -0500\n\
            data 14\n\
            initial import\n\
            from :1\n\
            merge :3\n\
            property empty\n\
            property planet 5 world\n\
            M 644 inline README\n\
            data 2\nhi";
        assert_eq!(cmd.encode(&WriteOptions::default()).unwrap().as_ref(), expected);
    }

    #[test]
    fn test_encode_commit_without_features() {
        let mut properties = BTreeMap::new();
        properties.insert("p".to_string(), Some("v".to_string()));
        let cmd = Command::Commit(CommitCommand {
            ref_name: "refs/heads/master".to_string(),
            mark: None,
            author: Some(who("Fluffy", "fluffy@bunny.org")),
            more_authors: vec![who("Daffy", "daffy@duck.org")],
            committer: who("bugs bunny", "bugs@bunny.org"),
            message: None,
            from: None,
            merges: Vec::new(),
            properties,
            files: FileList::empty(),
            lineno: 1,
        });
        let options = WriteOptions {
            use_features: false,
            ..WriteOptions::default()
        };
        let expected: &[u8] = b"commit refs/heads/master\n\
            author Fluffy <fluffy@bunny.org> 1234567890 -0500\n\
            committer bugs bunny <bugs@bunny.org> 1234567890 -0500";
        assert_eq!(cmd.encode(&options).unwrap().as_ref(), expected);
    }

    #[test]
    fn test_encode_file_modify_variants() {
        let options = WriteOptions::default();
        let inline = FileCommand::Modify {
            path: path(b"README"),
            mode: Mode::Regular,
            dataref: None,
            data: Some(Bytes::from_static(b"hello")),
        };
        assert_eq!(
            inline.encode(&options).as_ref(),
            b"M 644 inline README\ndata 5\nhello"
        );

        let byref = FileCommand::Modify {
            path: path(b"tree-id"),
            mode: Mode::Gitlink,
            dataref: Some("rev-id".to_string()),
            data: None,
        };
        assert_eq!(byref.encode(&options).as_ref(), b"M 160000 rev-id tree-id");

        let dir = FileCommand::Modify {
            path: path(b"pkg"),
            mode: Mode::Directory,
            dataref: None,
            data: None,
        };
        assert_eq!(dir.encode(&options).as_ref(), b"M 040000 - pkg");
    }

    #[test]
    fn test_encode_file_modify_without_contents() {
        let options = WriteOptions {
            include_file_contents: false,
            ..WriteOptions::default()
        };
        let inline = FileCommand::Modify {
            path: path(b"README"),
            mode: Mode::Regular,
            dataref: None,
            data: Some(Bytes::from_static(b"hello")),
        };
        assert_eq!(inline.encode(&options).as_ref(), b"M 644 inline README");
    }

    #[test]
    fn test_encode_other_file_commands() {
        let options = WriteOptions::default();
        let delete = FileCommand::Delete {
            path: path(b"a/b.txt"),
        };
        assert_eq!(delete.encode(&options).as_ref(), b"D a/b.txt");

        let copy = FileCommand::Copy {
            src_path: path(b"old file"),
            dest_path: path(b"new"),
        };
        assert_eq!(copy.encode(&options).as_ref(), b"C \"old file\" new");

        let rename = FileCommand::Rename {
            old_path: path(b"from"),
            new_path: path(b"to"),
        };
        assert_eq!(rename.encode(&options).as_ref(), b"R from to");

        assert_eq!(
            FileCommand::DeleteAll.encode(&options).as_ref(),
            b"deleteall"
        );
    }

    #[test]
    fn test_format_path_quoting() {
        let mut buf = BytesMut::new();
        format_path(&mut buf, b"plain/path", false, false);
        assert_eq!(buf.as_ref(), b"plain/path");

        let mut buf = BytesMut::new();
        format_path(&mut buf, b"with space", false, false);
        assert_eq!(buf.as_ref(), b"with space");

        let mut buf = BytesMut::new();
        format_path(&mut buf, b"with space", true, false);
        assert_eq!(buf.as_ref(), b"\"with space\"");

        let mut buf = BytesMut::new();
        format_path(&mut buf, b"a\nb", false, false);
        assert_eq!(buf.as_ref(), b"\"a\\nb\"");

        let mut buf = BytesMut::new();
        format_path(&mut buf, b"\"quoted\"", false, false);
        assert_eq!(buf.as_ref(), b"\"\\\"quoted\\\"\"");

        let mut buf = BytesMut::new();
        format_path(&mut buf, b"back\\slash\n", false, false);
        assert_eq!(buf.as_ref(), b"\"back\\\\slash\\n\"");
    }

    #[test]
    fn test_format_path_legacy_pad() {
        let mut buf = BytesMut::new();
        format_path(&mut buf, b"with space", true, true);
        assert_eq!(buf.as_ref(), b"\"with space\" ");

        // unquoted paths never get the pad
        let mut buf = BytesMut::new();
        format_path(&mut buf, b"plain", true, true);
        assert_eq!(buf.as_ref(), b"plain");
    }

    #[test]
    fn test_format_property() {
        let mut buf = BytesMut::new();
        format_property(&mut buf, "p1", None);
        assert_eq!(buf.as_ref(), b"property p1");

        let mut buf = BytesMut::new();
        format_property(&mut buf, "p3", Some("alpha\nbeta\ngamma"));
        assert_eq!(buf.as_ref(), b"property p3 16 alpha\nbeta\ngamma");
    }

    #[test]
    fn test_write_stream_separates_commands() {
        let commands = vec![
            Command::Checkpoint(CheckpointCommand { lineno: 1 }),
            Command::Progress(ProgressCommand {
                message: Bytes::from_static(b"completed"),
                lineno: 2,
            }),
        ];
        let mut buf = BytesMut::new();
        write_stream(&commands, &WriteOptions::default(), &mut buf).unwrap();
        assert_eq!(buf.as_ref(), b"checkpoint\nprogress completed\n");
    }
}
