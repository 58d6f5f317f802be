use std::fmt::Display;

/// 1-based position of the first character of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub column: usize,
}

impl Span {
    pub fn start() -> Self {
        Self { line: 1, column: 1 }
    }

    /// Moves past `consumed`, tracking newlines.
    pub fn advance(&mut self, consumed: &str) {
        for c in consumed.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }
}

impl Default for Span {
    fn default() -> Self {
        Self::start()
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.line, self.column)
    }
}
