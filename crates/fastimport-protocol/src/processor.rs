//! Command dispatch
//!
//! [`ImportProcessor`] is the consuming side of a stream: one handler per
//! command kind, a driver that feeds parser output through them, and
//! parameter validation for processor construction.

use tracing::debug;

use fastimport_core::{
    BlobCommand, CheckpointCommand, Command, CommitCommand, Error as CoreError, FeatureCommand,
    ProgressCommand, ResetCommand, TagCommand,
};

use crate::error::ParseResult;

/// Stream consumer with one handler per command kind.
///
/// Every handler defaults to a missing-handler error, so a processor only
/// implements the commands it cares about and still fails loudly when a
/// stream contains one it does not.
pub trait ImportProcessor {
    /// Parameter names this processor accepts.
    fn known_params(&self) -> &'static [&'static str] {
        &[]
    }

    /// Reject parameters outside [`ImportProcessor::known_params`].
    fn validate_params(&self, params: &[String]) -> Result<(), CoreError> {
        let knowns = self.known_params();
        for param in params {
            if !knowns.contains(&param.as_str()) {
                return Err(CoreError::UnknownParameter {
                    param: param.clone(),
                    knowns: knowns.iter().map(|name| name.to_string()).collect(),
                });
            }
        }
        Ok(())
    }

    /// Hook invoked before the first command.
    fn pre_process(&mut self) -> ParseResult<()> {
        Ok(())
    }

    /// Hook invoked after the last command.
    fn post_process(&mut self) -> ParseResult<()> {
        Ok(())
    }

    /// Checked after every command; `true` stops the run early.
    fn finished(&self) -> bool {
        false
    }

    fn blob(&mut self, _command: &BlobCommand) -> ParseResult<()> {
        Err(CoreError::MissingHandler("blob".to_string()).into())
    }

    fn checkpoint(&mut self, _command: &CheckpointCommand) -> ParseResult<()> {
        Err(CoreError::MissingHandler("checkpoint".to_string()).into())
    }

    fn commit(&mut self, _command: &CommitCommand) -> ParseResult<()> {
        Err(CoreError::MissingHandler("commit".to_string()).into())
    }

    fn feature(&mut self, _command: &FeatureCommand) -> ParseResult<()> {
        Err(CoreError::MissingHandler("feature".to_string()).into())
    }

    fn progress(&mut self, _command: &ProgressCommand) -> ParseResult<()> {
        Err(CoreError::MissingHandler("progress".to_string()).into())
    }

    fn reset(&mut self, _command: &ResetCommand) -> ParseResult<()> {
        Err(CoreError::MissingHandler("reset".to_string()).into())
    }

    fn tag(&mut self, _command: &TagCommand) -> ParseResult<()> {
        Err(CoreError::MissingHandler("tag".to_string()).into())
    }

    /// Route one command to its handler.
    fn handle(&mut self, command: &Command) -> ParseResult<()> {
        match command {
            Command::Blob(blob) => self.blob(blob),
            Command::Checkpoint(checkpoint) => self.checkpoint(checkpoint),
            Command::Commit(commit) => self.commit(commit),
            Command::Feature(feature) => self.feature(feature),
            Command::Progress(progress) => self.progress(progress),
            Command::Reset(reset) => self.reset(reset),
            Command::Tag(tag) => self.tag(tag),
        }
    }

    /// Drive a whole stream through the handlers, stopping at the first
    /// error or once [`ImportProcessor::finished`] reports true.
    fn process<I>(&mut self, commands: I) -> ParseResult<()>
    where
        Self: Sized,
        I: IntoIterator<Item = ParseResult<Command>>,
    {
        self.pre_process()?;
        for result in commands {
            let command = result?;
            debug!(
                command = command.name(),
                line = command.lineno(),
                "dispatching command"
            );
            self.handle(&command)?;
            if self.finished() {
                debug!("processor finished early");
                break;
            }
        }
        self.post_process()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseError;
    use crate::parser::ImportParser;

    #[derive(Default)]
    struct CountingProcessor {
        blobs: usize,
        commits: usize,
        progresses: usize,
        checkpoints: usize,
        stages: Vec<&'static str>,
    }

    impl ImportProcessor for CountingProcessor {
        fn known_params(&self) -> &'static [&'static str] {
            &["verbose"]
        }

        fn pre_process(&mut self) -> ParseResult<()> {
            self.stages.push("pre");
            Ok(())
        }

        fn post_process(&mut self) -> ParseResult<()> {
            self.stages.push("post");
            Ok(())
        }

        fn blob(&mut self, _command: &BlobCommand) -> ParseResult<()> {
            self.blobs += 1;
            Ok(())
        }

        fn commit(&mut self, _command: &CommitCommand) -> ParseResult<()> {
            self.commits += 1;
            Ok(())
        }

        fn progress(&mut self, _command: &ProgressCommand) -> ParseResult<()> {
            self.progresses += 1;
            Ok(())
        }

        fn checkpoint(&mut self, _command: &CheckpointCommand) -> ParseResult<()> {
            self.checkpoints += 1;
            Ok(())
        }
    }

    const SMALL_STREAM: &[u8] = b"progress hello\n\
        blob\n\
        mark :1\n\
        data 3\n\
        abc\n\
        commit refs/heads/main\n\
        mark :2\n\
        committer <a@b> 0 +0000\n\
        data 5\n\
        start\n\
        checkpoint\n";

    #[test]
    fn test_process_counts_commands() {
        let mut processor = CountingProcessor::default();
        processor
            .process(ImportParser::new(SMALL_STREAM))
            .unwrap();
        assert_eq!(processor.blobs, 1);
        assert_eq!(processor.commits, 1);
        assert_eq!(processor.progresses, 1);
        assert_eq!(processor.checkpoints, 1);
        assert_eq!(processor.stages, vec!["pre", "post"]);
    }

    struct EmptyProcessor;

    impl ImportProcessor for EmptyProcessor {}

    #[test]
    fn test_missing_handler() {
        let mut processor = EmptyProcessor;
        let err = processor
            .process(ImportParser::new(&b"blob\ndata 1\nx\n"[..]))
            .unwrap_err();
        match err {
            ParseError::Core(CoreError::MissingHandler(name)) => assert_eq!(name, "blob"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    struct StopAfterFirstCommit {
        commits: usize,
        tags: usize,
    }

    impl ImportProcessor for StopAfterFirstCommit {
        fn commit(&mut self, _command: &CommitCommand) -> ParseResult<()> {
            self.commits += 1;
            Ok(())
        }

        fn tag(&mut self, _command: &TagCommand) -> ParseResult<()> {
            self.tags += 1;
            Ok(())
        }

        fn finished(&self) -> bool {
            self.commits > 0
        }
    }

    #[test]
    fn test_finished_stops_early() {
        let stream = b"commit refs/heads/main\n\
            committer <a@b> 0 +0000\n\
            data 3\none\n\
            commit refs/heads/main\n\
            committer <a@b> 0 +0000\n\
            data 3\ntwo\n\
            tag v1\nfrom :1\ntagger <a@b> 0 +0000\ndata 1\nx\n";
        let mut processor = StopAfterFirstCommit { commits: 0, tags: 0 };
        processor.process(ImportParser::new(&stream[..])).unwrap();
        assert_eq!(processor.commits, 1);
        assert_eq!(processor.tags, 0);
    }

    #[test]
    fn test_validate_params() {
        let processor = CountingProcessor::default();
        assert!(processor.validate_params(&["verbose".to_string()]).is_ok());
        let err = processor
            .validate_params(&["colour".to_string()])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unknown parameter - 'colour' not in [\"verbose\"]"
        );
    }

    #[test]
    fn test_parser_error_propagates() {
        let mut processor = CountingProcessor::default();
        let err = processor
            .process(ImportParser::new(&b"nonsense\n"[..]))
            .unwrap_err();
        assert!(matches!(err, ParseError::InvalidCommand { .. }));
    }
}
