//! Terminal prompter: questions on stdout, answers from stdin

use colored::Colorize;
use hostprep_core::traits::ABORT_KEYWORD;
use hostprep_core::{Error, Notice, Prompter, Reply};
use std::io::{self, BufRead, IsTerminal, Write};

/// Prompter bound to the controlling terminal
pub struct TerminalPrompter {
    input: io::Stdin,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self {
            input: io::stdin(),
        }
    }

    /// Print the banner shown before the first question
    pub fn banner(&mut self, document_dir: &str) {
        println!("{}", "hostprep".bright_white().bold());
        println!(
            "Answers are written to {}. Type {} at any prompt to quit.",
            document_dir.bright_white(),
            ABORT_KEYWORD.bright_yellow()
        );
        println!();
    }

    fn show_question(&self, question: &str) -> Result<(), Error> {
        print!("{} {} ", "?".bright_cyan().bold(), question.bold());
        io::stdout()
            .flush()
            .map_err(|e| Error::prompt(format!("cannot write prompt: {}", e)))
    }

    fn read_line(&mut self, question: &str) -> Result<Reply, Error> {
        self.show_question(question)?;
        let reply = read_reply(&mut self.input.lock())?;
        if reply == Reply::Cancel {
            println!();
        }
        Ok(reply)
    }
}

/// Read one line as raw bytes; end of input cancels
fn read_reply(reader: &mut impl BufRead) -> Result<Reply, Error> {
    let mut line = Vec::new();
    let read = reader
        .read_until(b'\n', &mut line)
        .map_err(|e| Error::prompt(format!("cannot read answer: {}", e)))?;

    if read == 0 {
        return Ok(Reply::Cancel);
    }
    Ok(Reply::from_bytes(&line))
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl Prompter for TerminalPrompter {
    fn ask(&mut self, question: &str) -> Result<Reply, Error> {
        self.read_line(question)
    }

    fn ask_secret(&mut self, question: &str) -> Result<Reply, Error> {
        // Piped input has no echo to hide
        if !self.input.is_terminal() {
            return self.read_line(question);
        }

        self.show_question(question)?;
        match rpassword::read_password() {
            Ok(secret) => Ok(Reply::from_line(&secret)),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => Ok(Reply::Unreadable),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                println!();
                Ok(Reply::Cancel)
            }
            Err(e) => Err(Error::prompt(format!("cannot read answer: {}", e))),
        }
    }

    fn notify(&mut self, notice: Notice) {
        match notice {
            Notice::Info(message) => println!("  {}", message.dimmed()),
            Notice::Warning(message) => println!("  {} {}", "!".bright_yellow().bold(), message),
            Notice::Rejected(message) => println!("  {} {}", "✗".bright_red().bold(), message.red()),
            Notice::Success(message) => println!("  {} {}", "✓".bright_green().bold(), message),
        }
    }
}
