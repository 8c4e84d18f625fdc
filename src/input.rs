use std::io::{self, BufRead, Write};

/// Line-oriented operator input paired with the stream prompts go to.
pub(crate) struct Console<R, W> {
    input: R,
    pub(crate) out: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, out: W) -> Self {
        Self { input, out }
    }

    /// Prints `prompt` and reads one trimmed line. `None` at end of input.
    pub(crate) fn prompt(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.out, "{prompt}")?;
        self.out.flush()?;
        self.read_line()
    }

    pub(crate) fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Asks a y/n question; only `y` (any case) is a yes.
    pub(crate) fn confirm(&mut self, prompt: &str) -> io::Result<bool> {
        Ok(self
            .prompt(prompt)?
            .is_some_and(|answer| answer.eq_ignore_ascii_case("y")))
    }
}
