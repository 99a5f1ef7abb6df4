//! Yes/no questions asked once per run, before any file is processed

use std::io::{self, BufRead, IsTerminal, Write};

use crate::cli::error::CliError;

/// Ask on stdin/stderr. Without a terminal the default is taken unasked.
pub fn confirm(question: &str, default: bool) -> Result<bool, CliError> {
    if !io::stdin().is_terminal() {
        return Ok(default);
    }
    confirm_with(&mut io::stdin().lock(), &mut io::stderr(), question, default)
}

pub fn confirm_with<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
    default: bool,
) -> Result<bool, CliError> {
    let hint = if default { "[Y/n]" } else { "[y/N]" };
    loop {
        write!(output, "{} {} ", question, hint).map_err(|e| CliError::IoError(e.to_string()))?;
        output.flush().map_err(|e| CliError::IoError(e.to_string()))?;

        let mut answer = String::new();
        let read = input
            .read_line(&mut answer)
            .map_err(|e| CliError::IoError(e.to_string()))?;
        if read == 0 {
            return Ok(default);
        }
        match answer.trim().to_lowercase().as_str() {
            "" => return Ok(default),
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            _ => writeln!(output, "Please answer y or n.")
                .map_err(|e| CliError::IoError(e.to_string()))?,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn ask(input: &str, default: bool) -> (bool, String) {
        let mut out = Vec::new();
        let answer = confirm_with(&mut Cursor::new(input), &mut out, "Resume?", default).unwrap();
        (answer, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_answers() {
        assert!(ask("y\n", false).0);
        assert!(!ask("No\n", true).0);
        assert!(ask("\n", true).0);
        assert!(!ask("", false).0);
    }

    #[test]
    fn test_reasks_on_garbage() {
        let (answer, out) = ask("maybe\nyes\n", false);
        assert!(answer);
        assert!(out.contains("Please answer y or n."));
        assert_eq!(out.matches("Resume? [y/N]").count(), 2);
    }
}
