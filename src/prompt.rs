//! Password prompt with input echo disabled.

use std::io::{self, BufRead, IsTerminal};

use crate::core::{ForwardError, Result};

/// Reads one line from `reader`, without the trailing line terminator.
pub fn read_line<R: BufRead>(reader: &mut R) -> Result<String> {
    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .map_err(|e| ForwardError::Prompt(format!("Failed to read password: {}", e)))?;
    if read == 0 {
        return Err(ForwardError::Prompt("no input before end of file".to_string()));
    }
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    Ok(line)
}

/// Prompts for a password.
///
/// On a terminal the password is read with echo off through `rpassword`.
/// Piped input is read from stdin as is, so scripts can feed the password.
pub fn read_password(prompt: &str) -> Result<String> {
    let prompt = format!("{} ", prompt);
    if io::stdin().is_terminal() {
        return rpassword::prompt_password(prompt)
            .map_err(|e| ForwardError::Prompt(format!("Failed to read password: {}", e)));
    }
    eprint!("{}", prompt);
    read_line(&mut io::stdin().lock())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_line_strips_terminator() {
        assert_eq!(read_line(&mut Cursor::new("secret\n")).unwrap(), "secret");
        assert_eq!(read_line(&mut Cursor::new("secret\r\n")).unwrap(), "secret");
        assert_eq!(read_line(&mut Cursor::new("secret")).unwrap(), "secret");
        assert_eq!(read_line(&mut Cursor::new(" spaced \n")).unwrap(), " spaced ");
    }

    #[test]
    fn test_read_line_reads_only_first_line() {
        let mut input = Cursor::new("first\nsecond\n");
        assert_eq!(read_line(&mut input).unwrap(), "first");
        assert_eq!(read_line(&mut input).unwrap(), "second");
    }

    #[test]
    fn test_read_line_eof_is_an_error() {
        assert!(matches!(
            read_line(&mut Cursor::new("")),
            Err(ForwardError::Prompt(_))
        ));
    }
}
