//! Interactive confirmation before destructive cleanup.

use std::io::{self, BufRead, Write};

/// Token that must be typed to confirm deletion
pub const CONFIRMATION_TOKEN: &str = "sim";

/// Print `question` and read one line from `input`.
///
/// Only the exact token (surrounding whitespace ignored) confirms; anything
/// else, including EOF, is a refusal.
pub fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> io::Result<bool> {
    write!(output, "{} Type '{}': ", question, CONFIRMATION_TOKEN)?;
    output.flush()?;

    let mut answer = String::new();
    if input.read_line(&mut answer)? == 0 {
        writeln!(output)?;
        return Ok(false);
    }

    Ok(answer.trim() == CONFIRMATION_TOKEN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn answer(text: &str) -> bool {
        let mut input = Cursor::new(text.as_bytes().to_vec());
        let mut output = Vec::new();
        confirm(&mut input, &mut output, "Delete originals?").unwrap()
    }

    #[test]
    fn test_exact_token_confirms() {
        assert!(answer("sim\n"));
        assert!(answer("  sim \r\n"));
    }

    #[test]
    fn test_anything_else_refuses() {
        assert!(!answer("s\n"));
        assert!(!answer("SIM\n"));
        assert!(!answer("yes\n"));
        assert!(!answer("sim please\n"));
        assert!(!answer("\n"));
        assert!(!answer(""));
    }

    #[test]
    fn test_prompt_is_written() {
        let mut input = Cursor::new(b"no\n".to_vec());
        let mut output = Vec::new();
        confirm(&mut input, &mut output, "Delete originals?").unwrap();

        let printed = String::from_utf8(output).unwrap();
        assert!(printed.starts_with("Delete originals?"));
        assert!(printed.contains("'sim'"));
    }
}
