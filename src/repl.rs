//! Line-oriented input handling for the interactive loop.
//!
//! Forms may span several lines; [`InputCollector`] buffers lines until the
//! parentheses seen so far balance and then hands the whole form over.

/// Net parenthesis depth of `source`: opens minus closes.
///
/// Text after `;` on a line is a comment and does not count.
pub fn paren_balance(source: &str) -> isize {
    source
        .lines()
        .map(|line| line.split_once(';').map_or(line, |(code, _)| code))
        .flat_map(str::chars)
        .map(|c| match c {
            '(' => 1,
            ')' => -1,
            _ => 0,
        })
        .sum()
}

/// True if `source` holds nothing but whitespace and comments
fn is_blank(source: &str) -> bool {
    source
        .lines()
        .all(|line| line.split_once(';').map_or(line, |(code, _)| code).trim().is_empty())
}

/// Accumulates REPL lines into complete forms.
#[derive(Debug, Default)]
pub struct InputCollector {
    buffer: String,
}

impl InputCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a line of input. Returns the buffered text once it forms a
    /// complete expression (or has more closing than opening parens, which
    /// the reader will reject).
    pub fn push_line(&mut self, line: &str) -> Option<String> {
        if !self.buffer.is_empty() {
            self.buffer.push('\n');
        }
        self.buffer.push_str(line);

        if is_blank(&self.buffer) {
            self.buffer.clear();
            return None;
        }
        if paren_balance(&self.buffer) > 0 {
            log::trace!("waiting for {} closing paren(s)", paren_balance(&self.buffer));
            return None;
        }
        Some(std::mem::take(&mut self.buffer))
    }

    /// Whether a partial form is waiting for more lines
    pub fn is_pending(&self) -> bool {
        !self.buffer.is_empty()
    }

    /// Drop any partial form
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}
