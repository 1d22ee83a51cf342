//! Tokenizer for the instruction stream of an assembly listing.
//!
//! Comment lines (`// ...`) carry the reflection header and are handled by [`crate::header`];
//! the lexer drops them so the decoder only ever sees instruction tokens.

/// A token borrowed from the listing, tagged with its 1-based source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub text: &'a str,
    pub line: usize,
}

fn is_separator(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n' | ',')
}

fn is_cutoff(c: char) -> bool {
    matches!(c, '{' | '}' | '(' | ')')
}

#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut tokens = Vec::new();
        for (idx, raw_line) in source.lines().enumerate() {
            let line = idx + 1;
            let code = match raw_line.find("//") {
                Some(at) => &raw_line[..at],
                None => raw_line,
            };
            tokenize_line(code, line, &mut tokens);
        }
        Self { tokens, pos: 0 }
    }

    pub fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    pub fn advance(&mut self) -> Option<Token<'a>> {
        let tok = self.peek()?;
        self.pos += 1;
        Some(tok)
    }

    pub fn is_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    /// Consumes the next token only if it sits on `line`.
    pub fn next_on_line(&mut self, line: usize) -> Option<Token<'a>> {
        match self.peek() {
            Some(tok) if tok.line == line => {
                self.pos += 1;
                Some(tok)
            }
            _ => None,
        }
    }

    /// Peeks at the next token only if it sits on `line`.
    pub fn peek_on_line(&self, line: usize) -> Option<Token<'a>> {
        self.peek().filter(|tok| tok.line == line)
    }

    /// Drops every remaining token on `line`.
    pub fn skip_line(&mut self, line: usize) {
        while self.next_on_line(line).is_some() {}
    }
}

fn tokenize_line<'a>(code: &'a str, line: usize, out: &mut Vec<Token<'a>>) {
    let mut start: Option<usize> = None;
    for (i, c) in code.char_indices() {
        if is_separator(c) || is_cutoff(c) {
            if let Some(s) = start.take() {
                out.push(Token {
                    text: &code[s..i],
                    line,
                });
            }
            if is_cutoff(c) {
                out.push(Token {
                    text: &code[i..i + c.len_utf8()],
                    line,
                });
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        out.push(Token {
            text: &code[s..],
            line,
        });
    }
}
