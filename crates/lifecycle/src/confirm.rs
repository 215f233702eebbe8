//! Typed confirmation gate before irreversible work.

use std::io::{BufRead, Write};

use crate::error::{ExecuteError, Result};

/// Prompt written before reading the confirmation line
pub const PROMPT: &str = "Type ACCEPT or CONFIRM to continue: ";

/// Phrases that unlock execution, compared case-insensitively
pub const ACCEPTED_PHRASES: [&str; 2] = ["ACCEPT", "CONFIRM"];

/// Prompt once and read one line.
///
/// Anything other than an accepted phrase, including an empty line or a
/// closed stream, is a rejection.
pub fn require_confirmation(input: &mut dyn BufRead, out: &mut dyn Write) -> Result<()> {
    out.write_all(PROMPT.as_bytes())
        .and_then(|()| out.flush())
        .map_err(ExecuteError::Input)?;

    let mut line = String::new();
    input.read_line(&mut line).map_err(ExecuteError::Input)?;

    let answer = line.trim().to_ascii_uppercase();
    if ACCEPTED_PHRASES.contains(&answer.as_str()) {
        Ok(())
    } else {
        log::debug!("Confirmation rejected");
        Err(ExecuteError::ConfirmationRejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn answer(text: &str) -> Result<()> {
        let mut out = Vec::new();
        let result = require_confirmation(&mut Cursor::new(text.as_bytes()), &mut out);
        assert_eq!(String::from_utf8(out).unwrap(), PROMPT);
        result
    }

    #[test]
    fn test_accepts_both_phrases_any_case() {
        assert!(answer("ACCEPT\n").is_ok());
        assert!(answer("confirm\n").is_ok());
        assert!(answer("  Accept  \r\n").is_ok());
        assert!(answer("CONFIRM").is_ok());
    }

    #[test]
    fn test_rejects_everything_else() {
        for text in ["", "\n", "yes\n", "ACCEPTED\n", "accept it\n"] {
            assert!(
                matches!(answer(text), Err(ExecuteError::ConfirmationRejected)),
                "accepted {text:?}"
            );
        }
    }

    #[test]
    fn test_reads_only_first_line() {
        assert!(matches!(
            answer("no\nACCEPT\n"),
            Err(ExecuteError::ConfirmationRejected)
        ));
    }
}
