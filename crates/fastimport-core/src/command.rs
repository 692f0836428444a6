//! Parsed command model
//!
//! One struct per top-level stream command, collected under the closed
//! [`Command`] union, plus the file sub-commands that ride inside commits.
//! Identity-bearing commands expose an `id()` that is either `:<mark>` or,
//! for unmarked commands, `@<lineno>`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Tree entry mode for file modifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    Regular,
    Executable,
    Directory,
    Symlink,
    Gitlink,
}

impl Mode {
    /// Interpret a numeric mode, accepting both short and long octal forms.
    pub fn from_raw(raw: u32) -> Result<Self> {
        match raw {
            0o644 | 0o100644 => Ok(Mode::Regular),
            0o755 | 0o100755 => Ok(Mode::Executable),
            0o40000 => Ok(Mode::Directory),
            0o120000 => Ok(Mode::Symlink),
            0o160000 => Ok(Mode::Gitlink),
            _ => Err(Error::UnknownMode(raw)),
        }
    }

    /// Interpret a mode token as it appears on an `M` line.
    pub fn from_wire(token: &[u8]) -> Option<Self> {
        match token {
            b"644" | b"100644" | b"0100644" => Some(Mode::Regular),
            b"755" | b"100755" | b"0100755" => Some(Mode::Executable),
            b"40000" | b"040000" | b"0040000" => Some(Mode::Directory),
            b"120000" | b"0120000" => Some(Mode::Symlink),
            b"160000" | b"0160000" => Some(Mode::Gitlink),
            _ => None,
        }
    }

    /// Canonical token used when serializing.
    pub fn as_wire(self) -> &'static str {
        match self {
            Mode::Regular => "644",
            Mode::Executable => "755",
            Mode::Directory => "040000",
            Mode::Symlink => "120000",
            Mode::Gitlink => "160000",
        }
    }

    /// Canonical numeric value.
    pub fn raw(self) -> u32 {
        match self {
            Mode::Regular => 0o100644,
            Mode::Executable => 0o100755,
            Mode::Directory => 0o40000,
            Mode::Symlink => 0o120000,
            Mode::Gitlink => 0o160000,
        }
    }

    pub fn is_dir(self) -> bool {
        matches!(self, Mode::Directory)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// Byte path of a tree entry.
///
/// Paths are raw bytes, not text. A path must be non-empty and relative
/// to the tree root, so a leading slash is rejected.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TreePath(Bytes);

impl fmt::Debug for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl TreePath {
    pub fn new(path: impl Into<Bytes>) -> Result<Self> {
        let path = path.into();
        if path.is_empty() || path[0] == b'/' {
            return Err(Error::InvalidPath(
                String::from_utf8_lossy(&path).into_owned(),
            ));
        }
        Ok(Self(path))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl AsRef<[u8]> for TreePath {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

/// An identity with a point in time: name, email, seconds since the epoch
/// and the UTC offset in seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhoWhen {
    pub name: Bytes,
    pub email: Bytes,
    pub timestamp: i64,
    pub tz_offset: i32,
}

impl WhoWhen {
    pub fn new(
        name: impl Into<Bytes>,
        email: impl Into<Bytes>,
        timestamp: i64,
        tz_offset: i32,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            timestamp,
            tz_offset,
        }
    }
}

/// A file sub-command inside a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileCommand {
    /// `M <mode> <dataref|inline|-> <path>`. Exactly one of `dataref` and
    /// `data` is populated, except for directory entries which carry neither.
    Modify {
        path: TreePath,
        mode: Mode,
        dataref: Option<String>,
        data: Option<Bytes>,
    },
    /// `D <path>`
    Delete { path: TreePath },
    /// `C <src> <dest>`
    Copy {
        src_path: TreePath,
        dest_path: TreePath,
    },
    /// `R <old> <new>`
    Rename {
        old_path: TreePath,
        new_path: TreePath,
    },
    /// `deleteall`
    DeleteAll,
}

impl FileCommand {
    pub fn name(&self) -> &'static str {
        match self {
            FileCommand::Modify { .. } => "filemodify",
            FileCommand::Delete { .. } => "filedelete",
            FileCommand::Copy { .. } => "filecopy",
            FileCommand::Rename { .. } => "filerename",
            FileCommand::DeleteAll => "filedeleteall",
        }
    }
}

type BoxedFileIter = Box<dyn Iterator<Item = FileCommand> + Send>;

/// The file sub-commands of a commit.
///
/// A reusable list can be iterated any number of times. A one-shot list
/// wraps an external iterator that can be drained exactly once; draining
/// it again fails with [`Error::FileListDrained`].
pub enum FileList {
    Reusable(Arc<[FileCommand]>),
    OneShot(Mutex<Option<BoxedFileIter>>),
}

impl FileList {
    pub fn empty() -> Self {
        FileList::Reusable(Vec::new().into())
    }

    pub fn reusable(commands: Vec<FileCommand>) -> Self {
        FileList::Reusable(commands.into())
    }

    pub fn one_shot<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = FileCommand>,
        I::IntoIter: Send + 'static,
    {
        FileList::OneShot(Mutex::new(Some(Box::new(iter.into_iter()))))
    }

    pub fn is_reusable(&self) -> bool {
        matches!(self, FileList::Reusable(_))
    }

    /// Number of commands, when known without draining.
    pub fn len(&self) -> Option<usize> {
        match self {
            FileList::Reusable(commands) => Some(commands.len()),
            FileList::OneShot(_) => None,
        }
    }

    pub fn is_empty(&self) -> Option<bool> {
        self.len().map(|n| n == 0)
    }

    /// Iterate the list. Fails if a one-shot list was already drained.
    pub fn iter(&self) -> Result<FileListIter> {
        match self {
            FileList::Reusable(commands) => Ok(FileListIter(IterInner::Slice {
                commands: Arc::clone(commands),
                next: 0,
            })),
            FileList::OneShot(slot) => slot
                .lock()
                .take()
                .map(|iter| FileListIter(IterInner::Boxed(iter)))
                .ok_or(Error::FileListDrained),
        }
    }
}

impl Default for FileList {
    fn default() -> Self {
        FileList::empty()
    }
}

impl From<Vec<FileCommand>> for FileList {
    fn from(commands: Vec<FileCommand>) -> Self {
        FileList::reusable(commands)
    }
}

impl fmt::Debug for FileList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileList::Reusable(commands) => f.debug_tuple("Reusable").field(commands).finish(),
            FileList::OneShot(slot) => {
                let state = if slot.lock().is_some() {
                    "pending"
                } else {
                    "drained"
                };
                write!(f, "OneShot({})", state)
            }
        }
    }
}

/// One-shot lists never compare equal, not even to themselves.
impl PartialEq for FileList {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FileList::Reusable(a), FileList::Reusable(b)) => a == b,
            _ => false,
        }
    }
}

/// Iterator over a commit's file sub-commands, yielding owned commands.
pub struct FileListIter(IterInner);

enum IterInner {
    Slice {
        commands: Arc<[FileCommand]>,
        next: usize,
    },
    Boxed(BoxedFileIter),
}

impl Iterator for FileListIter {
    type Item = FileCommand;

    fn next(&mut self) -> Option<FileCommand> {
        match &mut self.0 {
            IterInner::Slice { commands, next } => {
                let item = commands.get(*next).cloned();
                if item.is_some() {
                    *next += 1;
                }
                item
            }
            IterInner::Boxed(iter) => iter.next(),
        }
    }
}

fn make_id(mark: Option<&str>, lineno: u64) -> String {
    match mark {
        Some(mark) => format!(":{}", mark),
        None => format!("@{}", lineno),
    }
}

/// `blob`: raw content that later file modifications reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobCommand {
    pub mark: Option<String>,
    pub data: Bytes,
    pub lineno: u64,
}

impl BlobCommand {
    /// `:<mark>`, or `@<lineno>` when unmarked.
    pub fn id(&self) -> String {
        make_id(self.mark.as_deref(), self.lineno)
    }
}

/// `checkpoint`: a backend flush hint, carrying nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointCommand {
    pub lineno: u64,
}

/// `commit`: a new revision on a ref.
#[derive(Debug, PartialEq)]
pub struct CommitCommand {
    pub ref_name: String,
    pub mark: Option<String>,
    pub author: Option<WhoWhen>,
    /// Additional authors, populated via the multiple-authors extension.
    pub more_authors: Vec<WhoWhen>,
    pub committer: WhoWhen,
    pub message: Option<Bytes>,
    pub from: Option<String>,
    pub merges: Vec<String>,
    /// Extension properties, sorted by name. Text, unlike the message.
    pub properties: BTreeMap<String, Option<String>>,
    pub files: FileList,
    pub lineno: u64,
}

impl CommitCommand {
    /// `:<mark>`, or `@<lineno>` when unmarked.
    pub fn id(&self) -> String {
        make_id(self.mark.as_deref(), self.lineno)
    }

    /// Iterate the file sub-commands.
    pub fn iter_files(&self) -> Result<FileListIter> {
        self.files.iter()
    }
}

/// `feature`: declares a stream extension, optionally with a value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureCommand {
    pub name: String,
    pub value: Option<String>,
    pub lineno: u64,
}

/// `progress`: a message to relay to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressCommand {
    pub message: Bytes,
    pub lineno: u64,
}

/// `reset`: moves a ref, optionally to a known commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetCommand {
    pub ref_name: String,
    pub from: Option<String>,
    pub lineno: u64,
}

/// `tag`: an annotated tag on a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagCommand {
    pub id: String,
    pub from: Option<String>,
    pub tagger: Option<WhoWhen>,
    pub message: Option<Bytes>,
    pub lineno: u64,
}

/// A parsed top-level stream command.
#[derive(Debug, PartialEq)]
pub enum Command {
    Blob(BlobCommand),
    Checkpoint(CheckpointCommand),
    Commit(CommitCommand),
    Feature(FeatureCommand),
    Progress(ProgressCommand),
    Reset(ResetCommand),
    Tag(TagCommand),
}

impl Command {
    /// Protocol name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Blob(_) => "blob",
            Command::Checkpoint(_) => "checkpoint",
            Command::Commit(_) => "commit",
            Command::Feature(_) => "feature",
            Command::Progress(_) => "progress",
            Command::Reset(_) => "reset",
            Command::Tag(_) => "tag",
        }
    }

    /// Line the command started on.
    pub fn lineno(&self) -> u64 {
        match self {
            Command::Blob(c) => c.lineno,
            Command::Checkpoint(c) => c.lineno,
            Command::Commit(c) => c.lineno,
            Command::Feature(c) => c.lineno,
            Command::Progress(c) => c.lineno,
            Command::Reset(c) => c.lineno,
            Command::Tag(c) => c.lineno,
        }
    }
}
