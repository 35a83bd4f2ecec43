//! Input source resolution.
//!
//! Message and file arguments are tokenized once into a tagged form so the
//! stdin marker characters (`-` reads the whole pipe once, `_` streams it
//! line by line, `\-`/`\_` are the literal characters) never leak into
//! business logic as raw strings. The resolver then gathers message
//! candidates from the command line, the pipe, and the keyboard under the
//! mutual-exclusion rules of the run.

use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, warn};

use crate::report::Tally;

/// One parsed element of the message argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageArg {
    Literal(String),
    /// `-`: one blocking read of the entire pipe, inserted at this position.
    ReadPipeOnce,
    /// `_`: stream the pipe line by line after all other sends complete.
    StreamPipe,
}

/// One parsed element of the file argument list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileArg {
    Literal(PathBuf),
    /// `-`: spool the entire pipe into a temporary file and send that.
    ReadPipeOnce,
}

/// Tokenize the raw `--message` values.
pub fn tokenize_messages(raw: &[String]) -> Vec<MessageArg> {
    raw.iter()
        .map(|arg| match arg.as_str() {
            "-" => MessageArg::ReadPipeOnce,
            "_" => MessageArg::StreamPipe,
            "\\-" => MessageArg::Literal("-".to_string()),
            "\\_" => MessageArg::Literal("_".to_string()),
            other => MessageArg::Literal(other.to_string()),
        })
        .collect()
}

/// Tokenize the raw `--file` values.
pub fn tokenize_files(raw: &[String]) -> Vec<FileArg> {
    raw.iter()
        .map(|arg| match arg.as_str() {
            "-" => FileArg::ReadPipeOnce,
            "\\-" => FileArg::Literal(PathBuf::from("-")),
            other => FileArg::Literal(PathBuf::from(other)),
        })
        .collect()
}

/// Number of tokens across both lists that consume stdin.
pub fn stdin_claims(messages: &[MessageArg], files: &[FileArg]) -> usize {
    let from_messages = messages
        .iter()
        .filter(|m| matches!(m, MessageArg::ReadPipeOnce | MessageArg::StreamPipe))
        .count();
    let from_files = files
        .iter()
        .filter(|f| matches!(f, FileArg::ReadPipeOnce))
        .count();
    from_messages + from_files
}

/// Fatal argument-validation errors, detected before any action runs.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ArgError {
    #[error(
        "E240: the stdin markers '-' and '_' are used {0} times across the \
         message and file arguments; the stdin pipe can be consumed at most once"
    )]
    StdinClaimedTwice(usize),
}

/// Reject argument lists that would consume the stdin pipe more than once.
pub fn validate_stdin_claims(messages: &[MessageArg], files: &[FileArg]) -> Result<(), ArgError> {
    let claims = stdin_claims(messages, files);
    if claims > 1 {
        return Err(ArgError::StdinClaimedTwice(claims));
    }
    Ok(())
}

/// Decode the backslash escapes accepted by `--split` (`\t`, `\n`, `\\`).
pub fn unescape_separator(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Abstraction over the process's standard input so the resolver and the
/// dispatch engine can be driven by a fake pipe in tests.
pub trait StdinSource {
    /// True when stdin is an interactive terminal rather than a pipe.
    fn is_interactive(&self) -> bool;

    /// One blocking read of the entire pipe.
    fn read_all(&mut self) -> io::Result<Vec<u8>>;

    /// One line from the pipe, including its newline when present.
    /// Returns `Ok(None)` at end of stream.
    fn read_line(&mut self) -> io::Result<Option<Vec<u8>>>;

    /// Show `prompt` and read one line from the keyboard.
    fn prompt_line(&mut self, prompt: &str) -> io::Result<String>;
}

/// The real process stdin.
#[derive(Debug, Default)]
pub struct RealStdin;

impl StdinSource for RealStdin {
    fn is_interactive(&self) -> bool {
        io::stdin().is_terminal()
    }

    fn read_all(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        io::stdin().lock().read_to_end(&mut buf)?;
        Ok(buf)
    }

    fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut buf = Vec::new();
        let n = io::stdin().lock().read_until(b'\n', &mut buf)?;
        if n == 0 { Ok(None) } else { Ok(Some(buf)) }
    }

    fn prompt_line(&mut self, prompt: &str) -> io::Result<String> {
        // Prompt on stderr so redirected stdout stays clean.
        eprint!("{prompt}");
        io::stderr().flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line)
    }
}

/// Outcome of input resolution: the ordered message candidates plus whether
/// a streaming pipe read is still pending.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ResolvedInput {
    pub candidates: Vec<String>,
    pub streaming: bool,
}

/// Decode one pipe read. Binary content that is not valid UTF-8 drops the
/// candidate with a counted warning instead of aborting the run.
pub fn decode_pipe(bytes: Vec<u8>, tally: &mut Tally) -> Option<String> {
    match String::from_utf8(bytes) {
        Ok(text) => Some(text),
        Err(_) => {
            warn!("W112: piped data is not valid UTF-8 text; dropping it");
            tally.warning();
            None
        }
    }
}

/// Gather message candidates in their final send order.
///
/// Order: command-line candidates (with any `-` pipe read inserted in
/// place), then the implicit whole-pipe candidate, then the single keyboard
/// candidate. When `split` is set every candidate is subdivided on each
/// occurrence, preserving relative order.
pub fn resolve(
    messages: &[MessageArg],
    files_requested: bool,
    files_claim_stdin: bool,
    other_action_pending: bool,
    split: Option<&str>,
    stdin: &mut dyn StdinSource,
    tally: &mut Tally,
) -> io::Result<ResolvedInput> {
    let mut candidates = Vec::new();
    let mut streaming = false;
    let mut pipe_claimed = files_claim_stdin;

    for arg in messages {
        match arg {
            MessageArg::Literal(text) => candidates.push(text.clone()),
            MessageArg::ReadPipeOnce => {
                pipe_claimed = true;
                let bytes = stdin.read_all()?;
                if let Some(text) = decode_pipe(bytes, tally) {
                    candidates.push(text);
                }
            }
            MessageArg::StreamPipe => {
                // The actual line-by-line read happens after all
                // non-streaming sends complete.
                pipe_claimed = true;
                streaming = true;
            }
        }
    }

    if !pipe_claimed && !stdin.is_interactive() {
        debug!("stdin pipe unclaimed by markers; reading it as an implicit message");
        let bytes = stdin.read_all()?;
        if let Some(text) = decode_pipe(bytes, tally) {
            if !text.is_empty() {
                candidates.push(text);
            }
        }
    }

    if candidates.is_empty()
        && !streaming
        && !files_requested
        && !other_action_pending
        && stdin.is_interactive()
    {
        let line = stdin.prompt_line("Message to send: ")?;
        let line = line.trim_end_matches(['\n', '\r']);
        candidates.push(line.to_string());
    }

    if let Some(sep) = split {
        candidates = split_candidates(candidates, sep);
    }

    Ok(ResolvedInput { candidates, streaming })
}

/// Subdivide every candidate on `sep`, preserving relative order.
/// An empty separator leaves the candidates unchanged.
pub fn split_candidates(candidates: Vec<String>, sep: &str) -> Vec<String> {
    if sep.is_empty() {
        return candidates;
    }
    candidates
        .into_iter()
        .flat_map(|c| c.split(sep).map(str::to_string).collect::<Vec<_>>())
        .collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::collections::VecDeque;

    /// An in-memory stdin for tests: a pipe with fixed content, or an
    /// interactive terminal with scripted keyboard lines.
    pub struct FakeStdin {
        interactive: bool,
        pipe: VecDeque<u8>,
        keyboard: VecDeque<String>,
        pub prompts: Vec<String>,
    }

    impl FakeStdin {
        pub fn piped(data: &[u8]) -> Self {
            Self {
                interactive: false,
                pipe: data.iter().copied().collect(),
                keyboard: VecDeque::new(),
                prompts: Vec::new(),
            }
        }

        pub fn terminal(lines: &[&str]) -> Self {
            Self {
                interactive: true,
                pipe: VecDeque::new(),
                keyboard: lines.iter().map(|l| (*l).to_string()).collect(),
                prompts: Vec::new(),
            }
        }
    }

    impl StdinSource for FakeStdin {
        fn is_interactive(&self) -> bool {
            self.interactive
        }

        fn read_all(&mut self) -> io::Result<Vec<u8>> {
            Ok(std::mem::take(&mut self.pipe).into_iter().collect())
        }

        fn read_line(&mut self) -> io::Result<Option<Vec<u8>>> {
            if self.pipe.is_empty() {
                return Ok(None);
            }
            let mut line = Vec::new();
            while let Some(b) = self.pipe.pop_front() {
                line.push(b);
                if b == b'\n' {
                    break;
                }
            }
            Ok(Some(line))
        }

        fn prompt_line(&mut self, prompt: &str) -> io::Result<String> {
            self.prompts.push(prompt.to_string());
            Ok(self.keyboard.pop_front().unwrap_or_default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::FakeStdin;
    use super::*;

    fn lit(s: &str) -> MessageArg {
        MessageArg::Literal(s.to_string())
    }

    #[test]
    fn tokenizer_recognizes_markers_and_escapes() {
        let toks = tokenize_messages(&[
            "hello".to_string(),
            "-".to_string(),
            "_".to_string(),
            "\\-".to_string(),
            "\\_".to_string(),
        ]);
        assert_eq!(
            toks,
            vec![
                lit("hello"),
                MessageArg::ReadPipeOnce,
                MessageArg::StreamPipe,
                lit("-"),
                lit("_"),
            ]
        );
    }

    #[test]
    fn file_tokenizer_recognizes_marker() {
        let toks = tokenize_files(&["a.pdf".to_string(), "-".to_string(), "\\-".to_string()]);
        assert_eq!(
            toks,
            vec![
                FileArg::Literal(PathBuf::from("a.pdf")),
                FileArg::ReadPipeOnce,
                FileArg::Literal(PathBuf::from("-")),
            ]
        );
    }

    #[test]
    fn double_stdin_claim_is_rejected_across_lists() {
        let messages = tokenize_messages(&["-".to_string()]);
        let files = tokenize_files(&["-".to_string()]);
        let err = validate_stdin_claims(&messages, &files).unwrap_err();
        assert_eq!(err, ArgError::StdinClaimedTwice(2));

        let messages = tokenize_messages(&["-".to_string(), "_".to_string()]);
        assert!(validate_stdin_claims(&messages, &[]).is_err());
    }

    #[test]
    fn single_claim_in_either_list_is_fine() {
        let messages = tokenize_messages(&["_".to_string()]);
        assert!(validate_stdin_claims(&messages, &[]).is_ok());
        let files = tokenize_files(&["-".to_string()]);
        assert!(validate_stdin_claims(&[], &files).is_ok());
    }

    #[test]
    fn escaped_markers_do_not_claim_stdin() {
        let messages = tokenize_messages(&["\\-".to_string(), "\\_".to_string()]);
        let files = tokenize_files(&["\\-".to_string()]);
        assert_eq!(stdin_claims(&messages, &files), 0);
    }

    #[test]
    fn plain_messages_keep_declaration_order() {
        let messages = tokenize_messages(&["a".to_string(), "b".to_string(), "c".to_string()]);
        let mut stdin = FakeStdin::terminal(&[]);
        let mut tally = Tally::new();
        let out = resolve(&messages, false, false, false, None, &mut stdin, &mut tally).unwrap();
        assert_eq!(out.candidates, vec!["a", "b", "c"]);
        assert!(!out.streaming);
    }

    #[test]
    fn pipe_marker_reads_whole_pipe_in_place() {
        let messages = tokenize_messages(&["start".to_string(), "-".to_string(), "end".to_string()]);
        let mut stdin = FakeStdin::piped(b"middle\nlines\n");
        let mut tally = Tally::new();
        let out = resolve(&messages, false, false, false, None, &mut stdin, &mut tally).unwrap();
        assert_eq!(out.candidates, vec!["start", "middle\nlines\n", "end"]);
    }

    #[test]
    fn stream_marker_defers_reading() {
        let messages = tokenize_messages(&["first".to_string(), "_".to_string()]);
        let mut stdin = FakeStdin::piped(b"never read here");
        let mut tally = Tally::new();
        let out = resolve(&messages, false, false, false, None, &mut stdin, &mut tally).unwrap();
        assert_eq!(out.candidates, vec!["first"]);
        assert!(out.streaming);
        // The pipe is untouched until the streaming phase.
        assert_eq!(stdin.read_all().unwrap(), b"never read here");
    }

    #[test]
    fn unclaimed_pipe_becomes_implicit_candidate_after_cli_messages() {
        let messages = tokenize_messages(&["cli".to_string()]);
        let mut stdin = FakeStdin::piped(b"piped");
        let mut tally = Tally::new();
        let out = resolve(&messages, false, false, false, None, &mut stdin, &mut tally).unwrap();
        assert_eq!(out.candidates, vec!["cli", "piped"]);
    }

    #[test]
    fn empty_pipe_yields_no_candidate() {
        let mut stdin = FakeStdin::piped(b"");
        let mut tally = Tally::new();
        let out = resolve(&[], false, false, false, None, &mut stdin, &mut tally).unwrap();
        assert!(out.candidates.is_empty());
    }

    #[test]
    fn pipe_claimed_by_file_list_is_not_reread() {
        let mut stdin = FakeStdin::piped(b"file payload");
        let mut tally = Tally::new();
        let out = resolve(&[], true, true, false, None, &mut stdin, &mut tally).unwrap();
        assert!(out.candidates.is_empty());
        assert_eq!(stdin.read_all().unwrap(), b"file payload");
    }

    #[test]
    fn binary_pipe_is_dropped_with_warning() {
        let messages = tokenize_messages(&["-".to_string()]);
        let mut stdin = FakeStdin::piped(&[0xff, 0xfe, 0x00]);
        let mut tally = Tally::new();
        let out = resolve(&messages, false, false, false, None, &mut stdin, &mut tally).unwrap();
        assert!(out.candidates.is_empty());
        assert_eq!(tally.warnings(), 1);
        assert_eq!(tally.errors(), 0);
    }

    #[test]
    fn keyboard_prompt_fires_only_when_nothing_else_pends() {
        let mut stdin = FakeStdin::terminal(&["typed message\n"]);
        let mut tally = Tally::new();
        let out = resolve(&[], false, false, false, None, &mut stdin, &mut tally).unwrap();
        assert_eq!(out.candidates, vec!["typed message"]);
        assert_eq!(stdin.prompts.len(), 1);
    }

    #[test]
    fn keyboard_prompt_suppressed_by_files_or_other_actions() {
        let mut stdin = FakeStdin::terminal(&["unused\n"]);
        let mut tally = Tally::new();
        let out = resolve(&[], true, false, false, None, &mut stdin, &mut tally).unwrap();
        assert!(out.candidates.is_empty());
        assert!(stdin.prompts.is_empty());

        let mut stdin = FakeStdin::terminal(&["unused\n"]);
        let out = resolve(&[], false, false, true, None, &mut stdin, &mut tally).unwrap();
        assert!(out.candidates.is_empty());
        assert!(stdin.prompts.is_empty());
    }

    #[test]
    fn split_subdivides_every_candidate_in_order() {
        let messages = tokenize_messages(&["a;b".to_string(), "c".to_string()]);
        let mut stdin = FakeStdin::terminal(&[]);
        let mut tally = Tally::new();
        let out = resolve(&messages, false, false, false, Some(";"), &mut stdin, &mut tally)
            .unwrap();
        assert_eq!(out.candidates, vec!["a", "b", "c"]);
    }

    #[test]
    fn empty_split_separator_changes_nothing() {
        let got = split_candidates(vec!["a;b".to_string()], "");
        assert_eq!(got, vec!["a;b"]);
    }

    #[test]
    fn unescape_separator_decodes_common_escapes() {
        assert_eq!(unescape_separator("\\t"), "\t");
        assert_eq!(unescape_separator("\\n"), "\n");
        assert_eq!(unescape_separator("\\\\"), "\\");
        assert_eq!(unescape_separator(";"), ";");
        assert_eq!(unescape_separator("a\\qb"), "a\\qb");
    }
}
