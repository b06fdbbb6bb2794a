use std::fmt::Display;
use std::io::{self, BufRead, Stdin, StdinLock, Stdout, Write};

use anyhow::Result;

/// Line-oriented prompt/answer channel.
pub struct Terminal<R, W> {
    input: R,
    output: W,
}

impl Terminal<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        let stdin: Stdin = io::stdin();
        Self::new(stdin.lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Terminal<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    pub fn say(&mut self, line: impl Display) -> Result<()> {
        writeln!(self.output, "{line}")?;
        Ok(())
    }

    /// Prints `question` and reads one line. `None` once input is exhausted.
    /// Bytes that are not UTF-8 come back as U+FFFD.
    pub fn prompt(&mut self, question: &str) -> Result<Option<String>> {
        write!(self.output, "{question}")?;
        self.output.flush()?;

        let mut line = Vec::new();
        if self.input.read_until(b'\n', &mut line)? == 0 {
            return Ok(None);
        }

        let answer = String::from_utf8_lossy(&line);
        Ok(Some(answer.trim_end_matches(['\r', '\n']).to_string()))
    }

    pub fn output(&self) -> &W {
        &self.output
    }
}
