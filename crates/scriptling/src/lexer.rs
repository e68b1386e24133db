//! The lexer: source text to a token stream with INDENT/DEDENT synthesis.
//!
//! Indentation is tracked with a width stack. On each physical newline outside
//! bracket depth the leading whitespace of the next line is measured (tab = 4
//! columns); widths above the stack top push and emit `Indent`, widths below
//! pop and emit one `Dedent` per level. Blank and comment-only lines never
//! touch the stack. At end of input the stack is drained so every `Indent`
//! is balanced by a `Dedent`.

use crate::token::{Token, TokenKind};

/// Number of columns a tab advances for indentation measurement.
const TAB_WIDTH: usize = 4;

/// Tokenizes `source`, ending the stream with a single `Eof` token.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut lexer = Lexer::new(source);
    lexer.run();
    merge_word_pairs(lexer.tokens)
}

/// Decodes the standard escape sequences in a plain (non-raw) string body.
///
/// Unknown escapes keep the backslash, matching the reference behaviour for
/// sequences like `"\q"`.
pub(crate) fn decode_escapes(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('0') => out.push('\0'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Merges `not in` and `is not` into single word-pair tokens.
fn merge_word_pairs(tokens: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter().peekable();
    while let Some(tok) = iter.next() {
        match tok.kind {
            TokenKind::Not if iter.peek().is_some_and(|next| next.kind == TokenKind::In) => {
                iter.next();
                out.push(Token::new(TokenKind::NotIn, "not in", tok.line, tok.column));
            }
            TokenKind::Is if iter.peek().is_some_and(|next| next.kind == TokenKind::Not) => {
                iter.next();
                out.push(Token::new(TokenKind::IsNot, "is not", tok.line, tok.column));
            }
            _ => out.push(tok),
        }
    }
    out
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    indents: Vec<usize>,
    bracket_depth: usize,
    tokens: Vec<Token>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            indents: vec![0],
            bracket_depth: 0,
            tokens: Vec::new(),
        }
    }

    fn run(&mut self) {
        self.handle_line_start();
        while self.pos < self.chars.len() {
            self.next_token();
        }
        // Terminate a trailing statement that has no newline of its own.
        if self
            .tokens
            .last()
            .is_some_and(|t| !matches!(t.kind, TokenKind::Newline))
        {
            self.push(TokenKind::Newline, "\n");
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push(TokenKind::Dedent, "");
        }
        self.push(TokenKind::Eof, "");
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.chars.get(self.pos).copied()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, literal: impl Into<String>) {
        let token = Token::new(kind, literal, self.line, self.column);
        self.tokens.push(token);
    }

    fn push_at(&mut self, kind: TokenKind, literal: impl Into<String>, line: u32, column: u32) {
        self.tokens.push(Token::new(kind, literal, line, column));
    }

    /// Measures indentation at the start of a logical line and emits
    /// `Indent`/`Dedent` tokens. Blank and comment-only lines are consumed
    /// without changing the stack.
    fn handle_line_start(&mut self) {
        loop {
            let mut width = 0;
            let mut scan = self.pos;
            while let Some(&c) = self.chars.get(scan) {
                match c {
                    ' ' => width += 1,
                    '\t' => width += TAB_WIDTH,
                    _ => break,
                }
                scan += 1;
            }
            match self.chars.get(scan) {
                // Blank line: consume it, indentation unchanged.
                Some('\n') => {
                    while self.pos <= scan {
                        self.bump();
                    }
                    continue;
                }
                // Comment-only line: consume through its newline.
                Some('#') => {
                    while self.pos < scan {
                        self.bump();
                    }
                    while let Some(c) = self.peek() {
                        self.bump();
                        if c == '\n' {
                            break;
                        }
                    }
                    if self.peek().is_none() {
                        return;
                    }
                    continue;
                }
                // End of input: trailing whitespace only.
                None => {
                    while self.pos < scan {
                        self.bump();
                    }
                    return;
                }
                Some(_) => {
                    while self.pos < scan {
                        self.bump();
                    }
                    let current = *self.indents.last().unwrap_or(&0);
                    if width > current {
                        self.indents.push(width);
                        self.push(TokenKind::Indent, "");
                    } else {
                        while width < *self.indents.last().unwrap_or(&0) {
                            self.indents.pop();
                            self.push(TokenKind::Dedent, "");
                        }
                    }
                    return;
                }
            }
        }
    }

    fn next_token(&mut self) {
        let Some(c) = self.peek() else { return };
        match c {
            ' ' | '\t' | '\r' => {
                self.bump();
            }
            '#' => {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
            }
            '\n' => {
                if self.bracket_depth == 0 {
                    self.push(TokenKind::Newline, "\n");
                    self.bump();
                    if self.pos < self.chars.len() {
                        self.handle_line_start();
                    }
                } else {
                    self.bump();
                }
            }
            '"' | '\'' => self.lex_string(false, false),
            '0'..='9' => self.lex_number(),
            c if c.is_alphabetic() || c == '_' => self.lex_ident_or_prefixed_string(),
            _ => self.lex_operator(),
        }
    }

    fn lex_ident_or_prefixed_string(&mut self) {
        // String prefixes: r"...", f"...", r'...', f'...'.
        if let Some(quote) = self.peek_at(1)
            && (quote == '"' || quote == '\'')
        {
            match self.peek() {
                Some('r') => {
                    self.bump();
                    self.lex_string(true, false);
                    return;
                }
                Some('f') => {
                    self.bump();
                    self.lex_string(false, true);
                    return;
                }
                _ => {}
            }
        }
        let line = self.line;
        let column = self.column;
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if c.is_alphanumeric() || c == '_' {
                ident.push(c);
                self.bump();
            } else {
                break;
            }
        }
        match TokenKind::keyword(&ident) {
            Some(kind) => self.push_at(kind, ident, line, column),
            None => self.push_at(TokenKind::Ident, ident, line, column),
        }
    }

    fn lex_number(&mut self) {
        let line = self.line;
        let column = self.column;
        let mut literal = String::new();

        // Hex, binary, and octal integer literals.
        if self.peek() == Some('0')
            && matches!(self.peek_at(1), Some('x' | 'X' | 'b' | 'B' | 'o' | 'O'))
        {
            literal.push(self.bump().unwrap_or('0'));
            literal.push(self.bump().unwrap_or('x'));
            while let Some(c) = self.peek() {
                if c.is_ascii_alphanumeric() || c == '_' {
                    literal.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
            self.push_at(TokenKind::IntLit, literal, line, column);
            return;
        }

        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '_' {
                literal.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if self.peek() == Some('.') && self.peek_at(1).is_none_or(|c| c != '.') {
            is_float = true;
            literal.push('.');
            self.bump();
            while let Some(c) = self.peek() {
                if c.is_ascii_digit() || c == '_' {
                    literal.push(c);
                    self.bump();
                } else {
                    break;
                }
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let sign_ok = match self.peek_at(1) {
                Some('+' | '-') => self.peek_at(2).is_some_and(|c| c.is_ascii_digit()),
                Some(c) => c.is_ascii_digit(),
                None => false,
            };
            if sign_ok {
                is_float = true;
                literal.push('e');
                self.bump();
                if matches!(self.peek(), Some('+' | '-')) {
                    literal.push(self.bump().unwrap_or('+'));
                }
                while let Some(c) = self.peek() {
                    if c.is_ascii_digit() {
                        literal.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
            }
        }
        let kind = if is_float { TokenKind::FloatLit } else { TokenKind::IntLit };
        self.push_at(kind, literal, line, column);
    }

    fn lex_string(&mut self, raw: bool, fstring: bool) {
        let line = self.line;
        let column = self.column;
        let Some(quote) = self.bump() else { return };
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.bump();
            self.bump();
        }

        let mut body = String::new();
        let mut backslashes = 0usize;
        loop {
            let Some(c) = self.peek() else {
                // Unterminated string: surface what we have; the parser will
                // usually report a follow-on error at the missing terminator.
                break;
            };
            if triple {
                if c == quote && self.peek_at(1) == Some(quote) && self.peek_at(2) == Some(quote) {
                    // Raw-triple strings treat every character before the
                    // terminator literally, including backslashes.
                    self.bump();
                    self.bump();
                    self.bump();
                    break;
                }
                body.push(c);
                self.bump();
                continue;
            }
            if c == '\n' {
                // Single-quoted strings do not span lines.
                break;
            }
            if c == quote {
                if (raw || fstring) && backslashes % 2 == 1 {
                    // An odd backslash run keeps the quote inside the literal.
                    body.push(c);
                    self.bump();
                    backslashes = 0;
                    continue;
                }
                self.bump();
                break;
            }
            if c == '\\' {
                backslashes += 1;
                if raw || fstring {
                    body.push(c);
                    self.bump();
                } else {
                    body.push(c);
                    self.bump();
                    if let Some(escaped) = self.peek() {
                        if escaped != '\n' {
                            body.push(escaped);
                            self.bump();
                        }
                    }
                    backslashes = 0;
                }
                continue;
            }
            backslashes = 0;
            body.push(c);
            self.bump();
        }

        if fstring {
            self.push_at(TokenKind::FStrLit, body, line, column);
        } else if raw {
            self.push_at(TokenKind::StrLit, body, line, column);
        } else {
            self.push_at(TokenKind::StrLit, decode_escapes(&body), line, column);
        }
    }

    fn lex_operator(&mut self) {
        let line = self.line;
        let column = self.column;
        let Some(c) = self.peek() else { return };
        let next = self.peek_at(1);
        let next2 = self.peek_at(2);

        // Three-character operators first, then two, then one.
        let (kind, len): (TokenKind, usize) = match (c, next, next2) {
            ('*', Some('*'), Some('=')) => (TokenKind::DoubleStarAssign, 3),
            ('/', Some('/'), Some('=')) => (TokenKind::DoubleSlashAssign, 3),
            ('<', Some('<'), Some('=')) => (TokenKind::ShlAssign, 3),
            ('>', Some('>'), Some('=')) => (TokenKind::ShrAssign, 3),

            ('=', Some('='), _) => (TokenKind::EqEq, 2),
            ('!', Some('='), _) => (TokenKind::NotEq, 2),
            ('<', Some('='), _) => (TokenKind::LtEq, 2),
            ('>', Some('='), _) => (TokenKind::GtEq, 2),
            ('<', Some('<'), _) => (TokenKind::Shl, 2),
            ('>', Some('>'), _) => (TokenKind::Shr, 2),
            ('*', Some('*'), _) => (TokenKind::DoubleStar, 2),
            ('/', Some('/'), _) => (TokenKind::DoubleSlash, 2),
            ('+', Some('='), _) => (TokenKind::PlusAssign, 2),
            ('-', Some('='), _) => (TokenKind::MinusAssign, 2),
            ('*', Some('='), _) => (TokenKind::StarAssign, 2),
            ('/', Some('='), _) => (TokenKind::SlashAssign, 2),
            ('%', Some('='), _) => (TokenKind::PercentAssign, 2),
            ('&', Some('='), _) => (TokenKind::AmpAssign, 2),
            ('|', Some('='), _) => (TokenKind::PipeAssign, 2),
            ('^', Some('='), _) => (TokenKind::CaretAssign, 2),

            ('=', _, _) => (TokenKind::Assign, 1),
            ('+', _, _) => (TokenKind::Plus, 1),
            ('-', _, _) => (TokenKind::Minus, 1),
            ('*', _, _) => (TokenKind::Star, 1),
            ('/', _, _) => (TokenKind::Slash, 1),
            ('%', _, _) => (TokenKind::Percent, 1),
            ('<', _, _) => (TokenKind::Lt, 1),
            ('>', _, _) => (TokenKind::Gt, 1),
            ('&', _, _) => (TokenKind::Amp, 1),
            ('|', _, _) => (TokenKind::Pipe, 1),
            ('^', _, _) => (TokenKind::Caret, 1),
            ('~', _, _) => (TokenKind::Tilde, 1),
            ('(', _, _) => (TokenKind::LParen, 1),
            (')', _, _) => (TokenKind::RParen, 1),
            ('[', _, _) => (TokenKind::LBracket, 1),
            (']', _, _) => (TokenKind::RBracket, 1),
            ('{', _, _) => (TokenKind::LBrace, 1),
            ('}', _, _) => (TokenKind::RBrace, 1),
            (',', _, _) => (TokenKind::Comma, 1),
            (':', _, _) => (TokenKind::Colon, 1),
            (';', _, _) => (TokenKind::Semicolon, 1),
            ('.', _, _) => (TokenKind::Dot, 1),
            ('@', _, _) => (TokenKind::At, 1),
            _ => {
                let literal = c.to_string();
                self.bump();
                self.push_at(TokenKind::Illegal, literal, line, column);
                return;
            }
        };

        match kind {
            TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => self.bracket_depth += 1,
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
            }
            _ => {}
        }

        let mut literal = String::new();
        for _ in 0..len {
            if let Some(c) = self.bump() {
                literal.push(c);
            }
        }
        self.push_at(kind, literal, line, column);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn indent_dedent_balance() {
        let source = "if x:\n    y = 1\n    if z:\n        w = 2\nq = 3\n";
        let tokens = tokenize(source);
        let indents = tokens.iter().filter(|t| t.kind == TokenKind::Indent).count();
        let dedents = tokens.iter().filter(|t| t.kind == TokenKind::Dedent).count();
        assert_eq!(indents, 2);
        assert_eq!(indents, dedents);
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
    }

    #[test]
    fn dedents_drained_at_eof() {
        let tokens = tokenize("if x:\n    y = 1");
        let dedents = tokens.iter().filter(|t| t.kind == TokenKind::Dedent).count();
        assert_eq!(dedents, 1);
    }

    #[test]
    fn blank_and_comment_lines_keep_indentation() {
        let source = "if x:\n    a = 1\n\n# comment at column zero\n    b = 2\n";
        let tokens = tokenize(source);
        let dedents_before_b = tokens
            .iter()
            .take_while(|t| t.literal != "b")
            .filter(|t| t.kind == TokenKind::Dedent)
            .count();
        assert_eq!(dedents_before_b, 0, "comment line must not dedent");
    }

    #[test]
    fn brackets_suppress_newline_and_indent() {
        let source = "x = [\n    1,\n    2,\n]\n";
        let tokens = tokenize(source);
        assert!(!tokens.iter().any(|t| t.kind == TokenKind::Indent));
        // Exactly one Newline: the one terminating the whole statement.
        let newlines = tokens.iter().filter(|t| t.kind == TokenKind::Newline).count();
        assert_eq!(newlines, 1);
    }

    #[test]
    fn token_lines_are_one_indexed() {
        let tokens = tokenize("a = 1\nb = 2\n");
        let a = tokens.iter().find(|t| t.literal == "a").unwrap();
        let b = tokens.iter().find(|t| t.literal == "b").unwrap();
        assert_eq!(a.line, 1);
        assert_eq!(b.line, 2);
    }

    #[test]
    fn tab_counts_four_columns() {
        let source = "if x:\n\ty = 1\n        z = 2\n";
        let tokens = tokenize(source);
        // Tab (4) then 8 spaces: 8 > 4 so the z-line indents further.
        let indents = tokens.iter().filter(|t| t.kind == TokenKind::Indent).count();
        assert_eq!(indents, 2);
    }

    #[test]
    fn string_flavours() {
        let tokens = tokenize(r#"a = "x\ny""#);
        let s = tokens.iter().find(|t| t.kind == TokenKind::StrLit).unwrap();
        assert_eq!(s.literal, "x\ny");

        let tokens = tokenize(r"a = r'x\ny'");
        let s = tokens.iter().find(|t| t.kind == TokenKind::StrLit).unwrap();
        assert_eq!(s.literal, "x\\ny");

        let tokens = tokenize("a = '''one\ntwo'''");
        let s = tokens.iter().find(|t| t.kind == TokenKind::StrLit).unwrap();
        assert_eq!(s.literal, "one\ntwo");
    }

    #[test]
    fn raw_string_escaped_quote_stays_open() {
        // The backslash blocks quote counting but stays in the literal.
        let tokens = tokenize(r"a = r'ab\'cd'");
        let s = tokens.iter().find(|t| t.kind == TokenKind::StrLit).unwrap();
        assert_eq!(s.literal, r"ab\'cd");
    }

    #[test]
    fn fstring_content_is_preserved_raw() {
        let tokens = tokenize(r#"a = f"x {y} \n""#);
        let s = tokens.iter().find(|t| t.kind == TokenKind::FStrLit).unwrap();
        assert_eq!(s.literal, r"x {y} \n");
    }

    #[test]
    fn numeric_literals() {
        let tokens = tokenize("a = 0x1F\nb = 0b101\nc = 0o17\nd = 1.5e-3\ne = 12\n");
        let nums: Vec<(TokenKind, String)> = tokens
            .iter()
            .filter(|t| matches!(t.kind, TokenKind::IntLit | TokenKind::FloatLit))
            .map(|t| (t.kind, t.literal.clone()))
            .collect();
        assert_eq!(
            nums,
            vec![
                (TokenKind::IntLit, "0x1F".to_string()),
                (TokenKind::IntLit, "0b101".to_string()),
                (TokenKind::IntLit, "0o17".to_string()),
                (TokenKind::FloatLit, "1.5e-3".to_string()),
                (TokenKind::IntLit, "12".to_string()),
            ]
        );
    }

    #[test]
    fn word_pair_operators() {
        assert!(kinds("a not in b\n").contains(&TokenKind::NotIn));
        assert!(kinds("a is not b\n").contains(&TokenKind::IsNot));
        // Plain `not` and `is` survive when not paired.
        assert!(kinds("not a\n").contains(&TokenKind::Not));
        assert!(kinds("a is b\n").contains(&TokenKind::Is));
    }

    #[test]
    fn augmented_operators_longest_match() {
        assert!(kinds("a //= 2\n").contains(&TokenKind::DoubleSlashAssign));
        assert!(kinds("a **= 2\n").contains(&TokenKind::DoubleStarAssign));
        assert!(kinds("a <<= 2\n").contains(&TokenKind::ShlAssign));
        assert!(kinds("a >> 2\n").contains(&TokenKind::Shr));
    }

    #[test]
    fn illegal_character() {
        let tokens = tokenize("a = 1 ?\n");
        let illegal = tokens.iter().find(|t| t.kind == TokenKind::Illegal).unwrap();
        assert_eq!(illegal.literal, "?");
    }
}
