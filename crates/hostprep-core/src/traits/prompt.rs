//! Operator interaction
//!
//! The wizard only talks to the operator through [`Prompter`]. Prompting is
//! synchronous: the wizard is single-threaded and blocks on each answer.

/// Typing this at any prompt cancels the wizard
pub const ABORT_KEYWORD: &str = ":abort";

/// Answer to a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Raw line typed by the operator (without the trailing newline)
    Answer(String),
    /// End of input or the abort keyword
    Cancel,
    /// A line that is not valid UTF-8; the question is asked again
    Unreadable,
}

impl Reply {
    /// Build a reply from a raw input line, mapping the abort keyword to `Cancel`
    pub fn from_line(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim() == ABORT_KEYWORD {
            Reply::Cancel
        } else {
            Reply::Answer(line.to_string())
        }
    }

    /// Build a reply from raw input bytes
    pub fn from_bytes(line: &[u8]) -> Self {
        match std::str::from_utf8(line) {
            Ok(text) => Self::from_line(text),
            Err(_) => Reply::Unreadable,
        }
    }
}

/// Message shown to the operator without expecting an answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Progress or informational text
    Info(String),
    /// Something the operator should look at, but not a rejection
    Warning(String),
    /// Why the last answer was not accepted
    Rejected(String),
    /// A stage finished successfully
    Success(String),
}

/// Trait for operator interaction
pub trait Prompter: Send {
    /// Ask a question with visible input
    fn ask(&mut self, question: &str) -> Result<Reply, crate::Error>;

    /// Ask a question without echoing the input
    fn ask_secret(&mut self, question: &str) -> Result<Reply, crate::Error>;

    /// Show a notice
    fn notify(&mut self, notice: Notice);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_from_line() {
        assert_eq!(Reply::from_line("alice\n"), Reply::Answer("alice".to_string()));
        assert_eq!(Reply::from_line("\r\n"), Reply::Answer(String::new()));
        assert_eq!(Reply::from_line(":abort\n"), Reply::Cancel);
        assert_eq!(Reply::from_line("  :abort "), Reply::Cancel);
    }

    #[test]
    fn test_reply_from_bytes() {
        assert_eq!(Reply::from_bytes(b"alice\n"), Reply::Answer("alice".to_string()));
        assert_eq!(Reply::from_bytes(b":abort\n"), Reply::Cancel);
        assert_eq!(Reply::from_bytes(b"al\xffce\n"), Reply::Unreadable);
        assert_eq!(Reply::from_bytes(b"\xc3\n"), Reply::Unreadable);
        assert_eq!(
            Reply::from_bytes("jos\u{e9}\n".as_bytes()),
            Reply::Answer("jos\u{e9}".to_string())
        );
    }
}
