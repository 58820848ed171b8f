//! Confirmation policies
//!
//! Destructive steps ask a [`ConfirmationPolicy`] before running. The
//! orchestrator and the teardown flow only see the trait; the terminal prompt
//! is one implementation among several.

use serde::Serialize;
use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Stdin, Stdout, Write};
use std::sync::Mutex;
use tracing::{debug, warn};

/// A yes/no question about one destructive action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmationRequest {
    /// What is affected, e.g. a table or cluster name
    pub subject: String,
    pub prompt: String,
}

impl ConfirmationRequest {
    pub fn new(subject: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            prompt: prompt.into(),
        }
    }
}

/// Answers confirmation requests
///
/// Returning `false` is a clean decline, never an error.
pub trait ConfirmationPolicy: Send + Sync {
    fn confirm(&self, request: &ConfirmationRequest) -> bool;
}

/// Approves everything (`--yes`)
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysYes;

impl ConfirmationPolicy for AlwaysYes {
    fn confirm(&self, request: &ConfirmationRequest) -> bool {
        debug!(subject = %request.subject, "Confirmed without asking");
        true
    }
}

/// Declines everything (`--no-input`)
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysNo;

impl ConfirmationPolicy for AlwaysNo {
    fn confirm(&self, request: &ConfirmationRequest) -> bool {
        debug!(subject = %request.subject, "Declined without asking");
        false
    }
}

/// Asks on a terminal and reads one line per question.
///
/// `y` or `yes` (any case) approves. Anything else, end of input or a read
/// error declines.
pub struct InteractivePrompt<R, W> {
    io: Mutex<(R, W)>,
}

impl InteractivePrompt<BufReader<Stdin>, Stdout> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stdout())
    }
}

impl<R: BufRead, W: Write> InteractivePrompt<R, W> {
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            io: Mutex::new((reader, writer)),
        }
    }

    fn ask(reader: &mut R, writer: &mut W, request: &ConfirmationRequest) -> io::Result<bool> {
        writeln!(writer, "{}", request.prompt)?;
        write!(writer, "[y/n] > ")?;
        writer.flush()?;

        let mut input = String::new();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }
        let input = input.trim().to_lowercase();
        Ok(input == "y" || input == "yes")
    }
}

impl<R, W> ConfirmationPolicy for InteractivePrompt<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn confirm(&self, request: &ConfirmationRequest) -> bool {
        let Ok(mut guard) = self.io.lock() else {
            warn!(subject = %request.subject, "Prompt unavailable, declining");
            return false;
        };
        let (reader, writer) = &mut *guard;

        match Self::ask(reader, writer, request) {
            Ok(answer) => answer,
            Err(e) => {
                warn!(subject = %request.subject, error = %e, "Failed to read answer, declining");
                false
            }
        }
    }
}

/// Replays a fixed list of answers; declines once the list is exhausted.
#[derive(Debug, Default)]
pub struct ScriptedSequence {
    answers: Mutex<VecDeque<bool>>,
    asked: Mutex<Vec<ConfirmationRequest>>,
}

impl ScriptedSequence {
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Every request received so far, in order
    pub fn asked(&self) -> Vec<ConfirmationRequest> {
        self.asked.lock().map(|a| a.clone()).unwrap_or_default()
    }

    /// Answers not yet consumed
    pub fn remaining(&self) -> usize {
        self.answers.lock().map(|a| a.len()).unwrap_or_default()
    }
}

impl ConfirmationPolicy for ScriptedSequence {
    fn confirm(&self, request: &ConfirmationRequest) -> bool {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(request.clone());
        }
        self.answers
            .lock()
            .ok()
            .and_then(|mut answers| answers.pop_front())
            .unwrap_or(false)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn request() -> ConfirmationRequest {
        ConfirmationRequest::new("staging_events", "Do you want to truncate table 'staging_events'?")
    }

    #[test]
    fn test_prompt_accepts_yes_variants() {
        for answer in ["y\n", "Y\n", "yes\n", " YES \n"] {
            let prompt = InteractivePrompt::new(Cursor::new(answer), Vec::new());
            assert!(prompt.confirm(&request()), "{:?} should approve", answer);
        }
    }

    #[test]
    fn test_prompt_declines_everything_else() {
        for answer in ["n\n", "\n", "yep\n", ""] {
            let prompt = InteractivePrompt::new(Cursor::new(answer), Vec::new());
            assert!(!prompt.confirm(&request()), "{:?} should decline", answer);
        }
    }

    #[test]
    fn test_prompt_writes_question() {
        let prompt = InteractivePrompt::new(Cursor::new("n\n"), Vec::new());
        prompt.confirm(&request());

        let (_, written) = prompt.io.into_inner().unwrap();
        let written = String::from_utf8(written).unwrap();
        assert_eq!(written, "Do you want to truncate table 'staging_events'?\n[y/n] > ");
    }

    #[test]
    fn test_prompt_reads_one_line_per_question() {
        let prompt = InteractivePrompt::new(Cursor::new("y\nn\ny\n"), Vec::new());
        assert!(prompt.confirm(&request()));
        assert!(!prompt.confirm(&request()));
        assert!(prompt.confirm(&request()));
        assert!(!prompt.confirm(&request()));
    }

    #[test]
    fn test_scripted_sequence_replays_then_declines() {
        let policy = ScriptedSequence::new([true, false]);

        assert!(policy.confirm(&request()));
        assert!(!policy.confirm(&request()));
        assert_eq!(policy.remaining(), 0);
        assert!(!policy.confirm(&request()));
        assert_eq!(policy.asked().len(), 3);
    }

    #[test]
    fn test_fixed_policies() {
        assert!(AlwaysYes.confirm(&request()));
        assert!(!AlwaysNo.confirm(&request()));
    }
}
