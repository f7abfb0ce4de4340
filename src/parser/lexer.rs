//! Lexer (tokenizer) for C source code
//!
//! Converts raw source text into a flat [`Token`] stream consumed by the parser.
//! Preprocessor lines and comments are skipped rather than tokenized; they
//! still reach the output because the rewriter copies the source text that
//! lies between token spans.

use super::ast::Span;
use std::fmt;
use thiserror::Error;

/// All token kinds produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    IntLiteral(i64),
    FloatLiteral(f64),
    CharLiteral(i8),
    StringLiteral(String),

    // Identifiers
    Ident(String),

    // Type keywords
    Int,
    Char,
    Short,
    Long,
    Float,
    Double,
    Bool,
    Void,
    Unsigned,
    Signed,
    Struct,
    Const,
    Static,
    Extern,
    Inline,

    // Statement keywords
    If,
    Else,
    While,
    Do,
    For,
    Switch,
    Case,
    Default,
    Break,
    Continue,
    Return,
    Goto,
    Sizeof,
    Null,
    True,
    False,

    // Arithmetic
    Plus,    // +
    Minus,   // -
    Star,    // *
    Slash,   // /
    Percent, // %

    // Comparison
    EqEq,  // ==
    NotEq, // !=
    Lt,    // <
    Le,    // <=
    Gt,    // >
    Ge,    // >=

    // Logical
    AndAnd, // &&
    OrOr,   // ||
    Bang,   // !

    // Bitwise
    Amp,   // &
    Pipe,  // |
    Caret, // ^
    Tilde, // ~
    LtLt,  // <<
    GtGt,  // >>

    // Assignment
    Eq,        // =
    PlusEq,    // +=
    MinusEq,   // -=
    StarEq,    // *=
    SlashEq,   // /=
    PercentEq, // %=
    AmpEq,     // &=
    PipeEq,    // |=
    CaretEq,   // ^=
    LtLtEq,    // <<=
    GtGtEq,    // >>=

    // Increment/Decrement
    PlusPlus,   // ++
    MinusMinus, // --

    // Member access
    Dot,   // .
    Arrow, // ->

    // Ternary
    Question, // ?
    Colon,    // :

    // Punctuation
    LParen,    // (
    RParen,    // )
    LBrace,    // {
    RBrace,    // }
    LBracket,  // [
    RBracket,  // ]
    Semicolon, // ;
    Comma,     // ,

    Eof,
}

impl TokenKind {
    /// Keywords that can start a type specifier
    pub fn starts_type(&self) -> bool {
        matches!(
            self,
            TokenKind::Int
                | TokenKind::Char
                | TokenKind::Short
                | TokenKind::Long
                | TokenKind::Float
                | TokenKind::Double
                | TokenKind::Bool
                | TokenKind::Void
                | TokenKind::Unsigned
                | TokenKind::Signed
                | TokenKind::Struct
                | TokenKind::Const
        )
    }
}

/// A token together with the exact source range it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::IntLiteral(n) => return write!(f, "int literal {}", n),
            TokenKind::FloatLiteral(n) => return write!(f, "float literal {}", n),
            TokenKind::CharLiteral(c) => {
                let byte = *c as u8;
                return if byte.is_ascii_graphic() || byte == b' ' {
                    write!(f, "char literal '{}'", byte as char)
                } else {
                    write!(f, "char literal '\\x{:02x}'", byte)
                };
            }
            TokenKind::StringLiteral(s) => return write!(f, "string literal \"{}\"", s),
            TokenKind::Ident(s) => return write!(f, "identifier '{}'", s),
            TokenKind::Eof => return write!(f, "end of file"),
            TokenKind::Int => "int",
            TokenKind::Char => "char",
            TokenKind::Short => "short",
            TokenKind::Long => "long",
            TokenKind::Float => "float",
            TokenKind::Double => "double",
            TokenKind::Bool => "bool",
            TokenKind::Void => "void",
            TokenKind::Unsigned => "unsigned",
            TokenKind::Signed => "signed",
            TokenKind::Struct => "struct",
            TokenKind::Const => "const",
            TokenKind::Static => "static",
            TokenKind::Extern => "extern",
            TokenKind::Inline => "inline",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::While => "while",
            TokenKind::Do => "do",
            TokenKind::For => "for",
            TokenKind::Switch => "switch",
            TokenKind::Case => "case",
            TokenKind::Default => "default",
            TokenKind::Break => "break",
            TokenKind::Continue => "continue",
            TokenKind::Return => "return",
            TokenKind::Goto => "goto",
            TokenKind::Sizeof => "sizeof",
            TokenKind::Null => "NULL",
            TokenKind::True => "true",
            TokenKind::False => "false",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Lt => "<",
            TokenKind::Le => "<=",
            TokenKind::Gt => ">",
            TokenKind::Ge => ">=",
            TokenKind::AndAnd => "&&",
            TokenKind::OrOr => "||",
            TokenKind::Bang => "!",
            TokenKind::Amp => "&",
            TokenKind::Pipe => "|",
            TokenKind::Caret => "^",
            TokenKind::Tilde => "~",
            TokenKind::LtLt => "<<",
            TokenKind::GtGt => ">>",
            TokenKind::Eq => "=",
            TokenKind::PlusEq => "+=",
            TokenKind::MinusEq => "-=",
            TokenKind::StarEq => "*=",
            TokenKind::SlashEq => "/=",
            TokenKind::PercentEq => "%=",
            TokenKind::AmpEq => "&=",
            TokenKind::PipeEq => "|=",
            TokenKind::CaretEq => "^=",
            TokenKind::LtLtEq => "<<=",
            TokenKind::GtGtEq => ">>=",
            TokenKind::PlusPlus => "++",
            TokenKind::MinusMinus => "--",
            TokenKind::Dot => ".",
            TokenKind::Arrow => "->",
            TokenKind::Question => "?",
            TokenKind::Colon => ":",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::Semicolon => ";",
            TokenKind::Comma => ",",
        };
        write!(f, "'{}'", text)
    }
}

/// Lexer error type
#[derive(Debug, Clone, Error)]
#[error("lexer error at line {}, column {}: {message}", .span.line, .span.column)]
pub struct LexError {
    pub message: String,
    pub span: Span,
}

/// Lexer for C source code
pub struct Lexer {
    input: Vec<(usize, char)>,
    len: usize,
    position: usize,
    line: usize,
    column: usize,
    at_line_start: bool,
}

impl Lexer {
    /// Create a new lexer for the given source string.
    pub fn new(input: &str) -> Self {
        Self {
            input: input.char_indices().collect(),
            len: input.len(),
            position: 0,
            line: 1,
            column: 1,
            at_line_start: true,
        }
    }

    /// Tokenize the entire input
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace_and_comments()?;

            if self.is_at_end() {
                let start = self.mark();
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    span: start,
                });
                break;
            }

            if self.at_line_start && self.peek() == Some('#') {
                self.skip_preprocessor_directive();
                continue;
            }

            self.at_line_start = false;
            tokens.push(self.next_token()?);
        }

        Ok(tokens)
    }

    /// Get next token
    fn next_token(&mut self) -> Result<Token, LexError> {
        let start = self.mark();
        let ch = self.advance().ok_or_else(|| LexError {
            message: "Unexpected end of file".to_string(),
            span: start,
        })?;

        let kind = match ch {
            '"' => self.string_literal(start)?,
            '\'' => self.char_literal(start)?,
            '0'..='9' => self.number_literal(ch, start)?,
            '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.number_literal(ch, start)?,
            'a'..='z' | 'A'..='Z' | '_' => self.identifier_or_keyword(ch),

            '+' => self.pick(&[('+', TokenKind::PlusPlus), ('=', TokenKind::PlusEq)], TokenKind::Plus),
            '-' => self.pick(
                &[
                    ('-', TokenKind::MinusMinus),
                    ('=', TokenKind::MinusEq),
                    ('>', TokenKind::Arrow),
                ],
                TokenKind::Minus,
            ),
            '*' => self.pick(&[('=', TokenKind::StarEq)], TokenKind::Star),
            '/' => self.pick(&[('=', TokenKind::SlashEq)], TokenKind::Slash),
            '%' => self.pick(&[('=', TokenKind::PercentEq)], TokenKind::Percent),
            '=' => self.pick(&[('=', TokenKind::EqEq)], TokenKind::Eq),
            '!' => self.pick(&[('=', TokenKind::NotEq)], TokenKind::Bang),
            '^' => self.pick(&[('=', TokenKind::CaretEq)], TokenKind::Caret),
            '&' => self.pick(&[('&', TokenKind::AndAnd), ('=', TokenKind::AmpEq)], TokenKind::Amp),
            '|' => self.pick(&[('|', TokenKind::OrOr), ('=', TokenKind::PipeEq)], TokenKind::Pipe),
            '<' => {
                if self.peek() == Some('<') {
                    self.advance();
                    self.pick(&[('=', TokenKind::LtLtEq)], TokenKind::LtLt)
                } else {
                    self.pick(&[('=', TokenKind::Le)], TokenKind::Lt)
                }
            }
            '>' => {
                if self.peek() == Some('>') {
                    self.advance();
                    self.pick(&[('=', TokenKind::GtGtEq)], TokenKind::GtGt)
                } else {
                    self.pick(&[('=', TokenKind::Ge)], TokenKind::Gt)
                }
            }
            '~' => TokenKind::Tilde,
            '.' => TokenKind::Dot,
            '?' => TokenKind::Question,
            ':' => TokenKind::Colon,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,

            _ => {
                return Err(LexError {
                    message: format!("Unexpected character: '{}'", ch),
                    span: self.span_from(start),
                })
            }
        };

        Ok(Token {
            kind,
            span: self.span_from(start),
        })
    }

    /// Consume one of `options` if the next character matches, else `fallback`.
    fn pick(&mut self, options: &[(char, TokenKind)], fallback: TokenKind) -> TokenKind {
        for (next, kind) in options {
            if self.peek() == Some(*next) {
                self.advance();
                return kind.clone();
            }
        }
        fallback
    }

    fn read_escape(&mut self, start: Span) -> Result<char, LexError> {
        let escaped = self.advance().ok_or_else(|| LexError {
            message: "Unexpected end of file in escape sequence".to_string(),
            span: start,
        })?;

        let value = match escaped {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            'a' => '\x07',
            'b' => '\x08',
            'f' => '\x0c',
            'v' => '\x0b',
            '\\' => '\\',
            '"' => '"',
            '\'' => '\'',
            '?' => '?',
            '0'..='7' => {
                let mut value = escaped.to_digit(8).unwrap_or(0);
                for _ in 0..2 {
                    match self.peek().and_then(|c| c.to_digit(8)) {
                        Some(d) => {
                            value = value * 8 + d;
                            self.advance();
                        }
                        None => break,
                    }
                }
                char::from_u32(value & 0xff).unwrap_or('\0')
            }
            'x' => {
                let mut digits = String::new();
                while let Some(c) = self.peek().filter(|c| c.is_ascii_hexdigit()) {
                    digits.push(c);
                    self.advance();
                }
                let value = u32::from_str_radix(&digits, 16).map_err(|_| LexError {
                    message: format!("Invalid hex escape sequence: \\x{}", digits),
                    span: self.span_from(start),
                })?;
                char::from_u32(value & 0xff).unwrap_or('\0')
            }
            _ => {
                return Err(LexError {
                    message: format!("Unknown escape sequence: \\{}", escaped),
                    span: self.span_from(start),
                });
            }
        };
        Ok(value)
    }

    /// Parse string literal
    fn string_literal(&mut self, start: Span) -> Result<TokenKind, LexError> {
        let mut string = String::new();

        while let Some(ch) = self.peek() {
            match ch {
                '"' => {
                    self.advance();
                    return Ok(TokenKind::StringLiteral(string));
                }
                '\n' => break,
                '\\' => {
                    self.advance();
                    string.push(self.read_escape(start)?);
                }
                _ => {
                    string.push(ch);
                    self.advance();
                }
            }
        }

        Err(LexError {
            message: "Unterminated string literal".to_string(),
            span: start,
        })
    }

    /// Parse character literal
    fn char_literal(&mut self, start: Span) -> Result<TokenKind, LexError> {
        let ch = self.advance().ok_or_else(|| LexError {
            message: "Unexpected end of file in character literal".to_string(),
            span: start,
        })?;

        let value = if ch == '\\' { self.read_escape(start)? } else { ch };

        if self.advance() != Some('\'') {
            return Err(LexError {
                message: "Expected closing quote in character literal".to_string(),
                span: self.span_from(start),
            });
        }

        Ok(TokenKind::CharLiteral(value as u32 as u8 as i8))
    }

    /// Parse numeric literal: decimal, hex, octal, or floating point, with
    /// optional `u`/`l`/`f` suffixes.
    fn number_literal(&mut self, first: char, start: Span) -> Result<TokenKind, LexError> {
        let mut text = String::new();
        text.push(first);

        let is_hex = first == '0' && matches!(self.peek(), Some('x') | Some('X'));
        if is_hex {
            self.advance();
            text.clear();
            while let Some(c) = self.peek().filter(|c| c.is_ascii_hexdigit()) {
                text.push(c);
                self.advance();
            }
        } else {
            let mut prev = first;
            while let Some(c) = self.peek() {
                let exponent_sign = (c == '+' || c == '-') && (prev == 'e' || prev == 'E');
                if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || exponent_sign {
                    text.push(c);
                    self.advance();
                    prev = c;
                } else {
                    break;
                }
            }
        }

        let mut float_suffix = false;
        while let Some(c) = self.peek().filter(|c| matches!(c, 'u' | 'U' | 'l' | 'L' | 'f' | 'F')) {
            float_suffix |= matches!(c, 'f' | 'F') && !is_hex;
            self.advance();
        }

        let invalid = || LexError {
            message: format!("Invalid numeric literal: {}", text),
            span: self.span_from(start),
        };

        if is_hex {
            return i64::from_str_radix(&text, 16)
                .or_else(|_| u64::from_str_radix(&text, 16).map(|v| v as i64))
                .map(TokenKind::IntLiteral)
                .map_err(|_| invalid());
        }
        if float_suffix || text.contains(['.', 'e', 'E']) {
            return text.parse::<f64>().map(TokenKind::FloatLiteral).map_err(|_| invalid());
        }
        if text.len() > 1 && text.starts_with('0') {
            return i64::from_str_radix(&text[1..], 8)
                .map(TokenKind::IntLiteral)
                .map_err(|_| invalid());
        }
        text.parse::<i64>()
            .or_else(|_| text.parse::<u64>().map(|v| v as i64))
            .map(TokenKind::IntLiteral)
            .map_err(|_| invalid())
    }

    /// Parse identifier or keyword
    fn identifier_or_keyword(&mut self, first_char: char) -> TokenKind {
        let mut ident = String::new();
        ident.push(first_char);

        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                ident.push(ch);
                self.advance();
            } else {
                break;
            }
        }

        match ident.as_str() {
            "int" => TokenKind::Int,
            "char" => TokenKind::Char,
            "short" => TokenKind::Short,
            "long" => TokenKind::Long,
            "float" => TokenKind::Float,
            "double" => TokenKind::Double,
            "bool" | "_Bool" => TokenKind::Bool,
            "void" => TokenKind::Void,
            "unsigned" => TokenKind::Unsigned,
            "signed" => TokenKind::Signed,
            "struct" => TokenKind::Struct,
            "const" => TokenKind::Const,
            "static" => TokenKind::Static,
            "extern" => TokenKind::Extern,
            "inline" => TokenKind::Inline,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "do" => TokenKind::Do,
            "for" => TokenKind::For,
            "switch" => TokenKind::Switch,
            "case" => TokenKind::Case,
            "default" => TokenKind::Default,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "return" => TokenKind::Return,
            "goto" => TokenKind::Goto,
            "sizeof" => TokenKind::Sizeof,
            "NULL" | "nullptr" => TokenKind::Null,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            _ => TokenKind::Ident(ident),
        }
    }

    /// Skip whitespace and comments
    fn skip_whitespace_and_comments(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some('\n') => {
                    self.advance();
                    self.at_line_start = true;
                }
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_ahead(1) == Some('/') => self.skip_line_comment(),
                Some('/') if self.peek_ahead(1) == Some('*') => self.skip_block_comment()?,
                _ => break,
            }
        }
        Ok(())
    }

    /// Skip single-line comment (// ...), leaving the newline in place
    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\n' {
                break;
            }
            self.advance();
        }
    }

    /// Skip multi-line comment (/* ... */)
    fn skip_block_comment(&mut self) -> Result<(), LexError> {
        let start = self.mark();
        self.advance(); // skip '/'
        self.advance(); // skip '*'

        while !self.is_at_end() {
            if self.peek() == Some('*') && self.peek_ahead(1) == Some('/') {
                self.advance();
                self.advance();
                return Ok(());
            }
            self.advance();
        }

        Err(LexError {
            message: "Unterminated block comment".to_string(),
            span: start,
        })
    }

    /// Skip a preprocessor directive, following backslash line continuations
    fn skip_preprocessor_directive(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '\\' && self.peek_ahead(1) == Some('\n') {
                self.advance();
                self.advance();
                continue;
            }
            if ch == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.position).map(|&(_, c)| c)
    }

    fn peek_ahead(&self, n: usize) -> Option<char> {
        self.input.get(self.position + n).map(|&(_, c)| c)
    }

    fn advance(&mut self) -> Option<char> {
        let (_, ch) = *self.input.get(self.position)?;
        self.position += 1;

        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }

        Some(ch)
    }

    fn is_at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn offset(&self) -> usize {
        self.input.get(self.position).map_or(self.len, |&(offset, _)| offset)
    }

    /// Zero-width span at the current position
    fn mark(&self) -> Span {
        let offset = self.offset();
        Span::new(offset, offset, self.line, self.column)
    }

    fn span_from(&self, start: Span) -> Span {
        Span::new(start.start, self.offset(), start.line, start.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_simple_tokens() {
        let tokens = kinds("int main() { return 0; }");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Int,
                TokenKind::Ident("main".into()),
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBrace,
                TokenKind::Return,
                TokenKind::IntLiteral(0),
                TokenKind::Semicolon,
                TokenKind::RBrace,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_operators() {
        let tokens = kinds("++ -- += -= == != && || <<= >>= ->");
        assert_eq!(
            &tokens[..11],
            &[
                TokenKind::PlusPlus,
                TokenKind::MinusMinus,
                TokenKind::PlusEq,
                TokenKind::MinusEq,
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::LtLtEq,
                TokenKind::GtGtEq,
                TokenKind::Arrow,
            ]
        );
    }

    #[test]
    fn test_spans_are_byte_offsets() {
        let src = "int  x; // note\n  y = 1.5f;";
        let tokens = Lexer::new(src).tokenize().unwrap();

        let x = &tokens[1];
        assert_eq!(&src[x.span.start..x.span.end], "x");
        assert_eq!((x.span.line, x.span.column), (1, 6));

        let y = &tokens[3];
        assert_eq!(&src[y.span.start..y.span.end], "y");
        assert_eq!((y.span.line, y.span.column), (2, 3));

        let lit = &tokens[5];
        assert_eq!(lit.kind, TokenKind::FloatLiteral(1.5));
        assert_eq!(&src[lit.span.start..lit.span.end], "1.5f");
    }

    #[test]
    fn test_comments() {
        let tokens = kinds("int x; // comment\nint y; /* block\ncomment */ int z;");
        assert_eq!(tokens[3], TokenKind::Int);
        assert_eq!(tokens[4], TokenKind::Ident("y".into()));
        assert_eq!(tokens[7], TokenKind::Ident("z".into()));
    }

    #[test]
    fn test_string_literal() {
        let tokens = kinds(r#""hello\nworld""#);
        assert_eq!(tokens[0], TokenKind::StringLiteral("hello\nworld".into()));
    }

    #[test]
    fn test_preprocessor_skip() {
        let tokens = kinds("#include <stdio.h>\n#define A \\\n 2\nint x;");
        assert_eq!(tokens[0], TokenKind::Int);
        assert_eq!(tokens[1], TokenKind::Ident("x".into()));
    }

    #[test]
    fn test_number_forms() {
        let tokens = kinds("0x1F 017 42u 3e2");
        assert_eq!(tokens[0], TokenKind::IntLiteral(31));
        assert_eq!(tokens[1], TokenKind::IntLiteral(15));
        assert_eq!(tokens[2], TokenKind::IntLiteral(42));
        assert_eq!(tokens[3], TokenKind::FloatLiteral(300.0));
    }

    #[test]
    fn test_unexpected_character() {
        let err = Lexer::new("int @").tokenize().unwrap_err();
        assert_eq!(err.span.column, 5);
    }
}
