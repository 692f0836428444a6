//! Field-level dumps of parsed commands
//!
//! An explicit ordered field table per command variant drives one generic
//! dump routine. Binary payloads are masked as `(...)` instead of printed.

use crate::command::{Command, FileCommand, FileList};

/// One dumpable field: its display name and whether the payload is binary.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub binary: bool,
}

const fn text(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        binary: false,
    }
}

const fn binary(name: &'static str) -> FieldSpec {
    FieldSpec { name, binary: true }
}

pub const BLOB_FIELDS: &[FieldSpec] = &[text("mark"), binary("data"), text("lineno"), text("id")];
pub const CHECKPOINT_FIELDS: &[FieldSpec] = &[text("lineno")];
pub const COMMIT_FIELDS: &[FieldSpec] = &[
    text("ref"),
    text("mark"),
    text("author"),
    text("more_authors"),
    text("committer"),
    text("message"),
    text("from"),
    text("merges"),
    text("properties"),
    text("lineno"),
    text("id"),
];
pub const FEATURE_FIELDS: &[FieldSpec] = &[text("name"), text("value"), text("lineno")];
pub const PROGRESS_FIELDS: &[FieldSpec] = &[text("message"), text("lineno")];
pub const RESET_FIELDS: &[FieldSpec] = &[text("ref"), text("from"), text("lineno")];
pub const TAG_FIELDS: &[FieldSpec] = &[
    text("id"),
    text("from"),
    text("tagger"),
    text("message"),
    text("lineno"),
];
pub const FILE_MODIFY_FIELDS: &[FieldSpec] =
    &[text("path"), text("mode"), text("dataref"), binary("data")];
pub const FILE_DELETE_FIELDS: &[FieldSpec] = &[text("path")];
pub const FILE_COPY_FIELDS: &[FieldSpec] = &[text("src_path"), text("dest_path")];
pub const FILE_RENAME_FIELDS: &[FieldSpec] = &[text("old_path"), text("new_path")];
pub const FILE_DELETE_ALL_FIELDS: &[FieldSpec] = &[];

/// The ordered field table for a command variant.
pub fn field_specs(command: &Command) -> &'static [FieldSpec] {
    match command {
        Command::Blob(_) => BLOB_FIELDS,
        Command::Checkpoint(_) => CHECKPOINT_FIELDS,
        Command::Commit(_) => COMMIT_FIELDS,
        Command::Feature(_) => FEATURE_FIELDS,
        Command::Progress(_) => PROGRESS_FIELDS,
        Command::Reset(_) => RESET_FIELDS,
        Command::Tag(_) => TAG_FIELDS,
    }
}

/// The ordered field table for a file sub-command variant.
pub fn file_field_specs(command: &FileCommand) -> &'static [FieldSpec] {
    match command {
        FileCommand::Modify { .. } => FILE_MODIFY_FIELDS,
        FileCommand::Delete { .. } => FILE_DELETE_FIELDS,
        FileCommand::Copy { .. } => FILE_COPY_FIELDS,
        FileCommand::Rename { .. } => FILE_RENAME_FIELDS,
        FileCommand::DeleteAll => FILE_DELETE_ALL_FIELDS,
    }
}

/// Debug dump of one command, driven by its field table.
///
/// `names` restricts the output to the listed fields; `verbose` prefixes
/// the command name. For a commit with a reusable file list, the file
/// sub-commands follow on tab-indented lines.
pub fn dump_str(command: &Command, names: Option<&[&str]>, verbose: bool) -> String {
    let mut out = dump_fields(field_specs(command), names, verbose, command.name(), |spec| {
        command_field(command, spec.name, spec.binary)
    });
    if let Command::Commit(commit) = command {
        if let FileList::Reusable(files) = &commit.files {
            for file in files.iter() {
                out.push_str("\n\t");
                out.push_str(&dump_file_str(file, names, verbose));
            }
        }
    }
    out
}

/// Debug dump of one file sub-command, driven by its field table.
pub fn dump_file_str(command: &FileCommand, names: Option<&[&str]>, verbose: bool) -> String {
    dump_fields(
        file_field_specs(command),
        names,
        verbose,
        command.name(),
        |spec| file_field(command, spec.name, spec.binary),
    )
}

fn dump_fields(
    specs: &[FieldSpec],
    names: Option<&[&str]>,
    verbose: bool,
    command_name: &str,
    mut value_of: impl FnMut(&FieldSpec) -> Option<String>,
) -> String {
    let mut parts = Vec::new();
    for spec in specs {
        if let Some(names) = names {
            if !names.contains(&spec.name) {
                continue;
            }
        }
        if let Some(value) = value_of(spec) {
            parts.push(format!("{}={}", spec.name, value));
        }
    }
    let line = parts.join(" ");
    if verbose {
        format!("{}: {}", command_name, line)
    } else {
        line
    }
}

fn command_field(command: &Command, name: &str, mask: bool) -> Option<String> {
    let value = match (command, name) {
        (Command::Blob(c), "mark") => format!("{:?}", c.mark),
        (Command::Blob(c), "data") => masked(mask, || format!("{:?}", c.data)),
        (Command::Blob(c), "lineno") => c.lineno.to_string(),
        (Command::Blob(c), "id") => format!("{:?}", c.id()),

        (Command::Checkpoint(c), "lineno") => c.lineno.to_string(),

        (Command::Commit(c), "ref") => format!("{:?}", c.ref_name),
        (Command::Commit(c), "mark") => format!("{:?}", c.mark),
        (Command::Commit(c), "author") => format!("{:?}", c.author),
        (Command::Commit(c), "more_authors") => format!("{:?}", c.more_authors),
        (Command::Commit(c), "committer") => format!("{:?}", c.committer),
        (Command::Commit(c), "message") => format!("{:?}", c.message),
        (Command::Commit(c), "from") => format!("{:?}", c.from),
        (Command::Commit(c), "merges") => format!("{:?}", c.merges),
        (Command::Commit(c), "properties") => format!("{:?}", c.properties),
        (Command::Commit(c), "lineno") => c.lineno.to_string(),
        (Command::Commit(c), "id") => format!("{:?}", c.id()),

        (Command::Feature(c), "name") => format!("{:?}", c.name),
        (Command::Feature(c), "value") => format!("{:?}", c.value),
        (Command::Feature(c), "lineno") => c.lineno.to_string(),

        (Command::Progress(c), "message") => format!("{:?}", c.message),
        (Command::Progress(c), "lineno") => c.lineno.to_string(),

        (Command::Reset(c), "ref") => format!("{:?}", c.ref_name),
        (Command::Reset(c), "from") => format!("{:?}", c.from),
        (Command::Reset(c), "lineno") => c.lineno.to_string(),

        (Command::Tag(c), "id") => format!("{:?}", c.id),
        (Command::Tag(c), "from") => format!("{:?}", c.from),
        (Command::Tag(c), "tagger") => format!("{:?}", c.tagger),
        (Command::Tag(c), "message") => format!("{:?}", c.message),
        (Command::Tag(c), "lineno") => c.lineno.to_string(),

        _ => return None,
    };
    Some(value)
}

fn file_field(command: &FileCommand, name: &str, mask: bool) -> Option<String> {
    let value = match (command, name) {
        (FileCommand::Modify { path, .. }, "path") => format!("{:?}", path),
        (FileCommand::Modify { mode, .. }, "mode") => format!("{:?}", mode),
        (FileCommand::Modify { dataref, .. }, "dataref") => format!("{:?}", dataref),
        (FileCommand::Modify { data, .. }, "data") => match data {
            None => "None".to_string(),
            Some(data) => masked(mask, || format!("{:?}", data)),
        },
        (FileCommand::Delete { path }, "path") => format!("{:?}", path),
        (FileCommand::Copy { src_path, .. }, "src_path") => format!("{:?}", src_path),
        (FileCommand::Copy { dest_path, .. }, "dest_path") => format!("{:?}", dest_path),
        (FileCommand::Rename { old_path, .. }, "old_path") => format!("{:?}", old_path),
        (FileCommand::Rename { new_path, .. }, "new_path") => format!("{:?}", new_path),
        _ => return None,
    };
    Some(value)
}

fn masked(mask: bool, render: impl FnOnce() -> String) -> String {
    if mask {
        "(...)".to_string()
    } else {
        render()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{BlobCommand, CommitCommand, Mode, TreePath, WhoWhen};
    use bytes::Bytes;
    use std::collections::BTreeMap;

    fn blob() -> Command {
        Command::Blob(BlobCommand {
            mark: Some("1".to_string()),
            data: Bytes::from_static(b"aaaa"),
            lineno: 4,
        })
    }

    #[test]
    fn test_dump_masks_binary_fields() {
        assert_eq!(
            dump_str(&blob(), None, false),
            "mark=Some(\"1\") data=(...) lineno=4 id=\":1\""
        );
    }

    #[test]
    fn test_dump_verbose_prefixes_command_name() {
        assert_eq!(
            dump_str(&blob(), None, true),
            "blob: mark=Some(\"1\") data=(...) lineno=4 id=\":1\""
        );
    }

    #[test]
    fn test_dump_filters_by_field_name() {
        assert_eq!(dump_str(&blob(), Some(&["mark"]), false), "mark=Some(\"1\")");
        assert_eq!(
            dump_str(&blob(), Some(&["mark", "lineno"]), false),
            "mark=Some(\"1\") lineno=4"
        );
    }

    #[test]
    fn test_dump_file_modify() {
        let file = FileCommand::Modify {
            path: TreePath::new(&b"README"[..]).unwrap(),
            mode: Mode::Regular,
            dataref: None,
            data: Some(Bytes::from_static(b"hello")),
        };
        assert_eq!(
            dump_file_str(&file, None, false),
            "path=b\"README\" mode=Regular dataref=None data=(...)"
        );
    }

    #[test]
    fn test_dump_commit_appends_file_lines() {
        let commit = Command::Commit(CommitCommand {
            ref_name: "refs/heads/master".to_string(),
            mark: Some("2".to_string()),
            author: None,
            more_authors: Vec::new(),
            committer: WhoWhen::new(&b"bugs"[..], &b"bugs@bunny.org"[..], 0, 0),
            message: None,
            from: None,
            merges: Vec::new(),
            properties: BTreeMap::new(),
            files: vec![FileCommand::DeleteAll].into(),
            lineno: 11,
        });
        let dump = dump_str(&commit, None, true);
        let mut lines = dump.lines();
        let first = lines.next().unwrap();
        assert!(first.starts_with("commit: ref=\"refs/heads/master\" mark=Some(\"2\")"));
        assert_eq!(lines.next().unwrap(), "\tfiledeleteall: ");
        assert!(lines.next().is_none());
    }
}
