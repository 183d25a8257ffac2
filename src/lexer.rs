//! Tokenizer for the template language.
//!
//! [`tokenize`] yields a lazy stream of located tokens. The token set follows
//! SVG path data conventions: a path command letter and the number glued to it
//! split into separate tokens (`M0,0Z` is `M 0 , 0 Z`), while ordinary
//! identifiers such as `atan2` stay whole. Whitespace separates tokens and is
//! elided; commas are kept as real tokens because the statement grammar uses
//! them.

use crate::errors::ParseError;

/// Source span of a token or AST node.
///
/// Lines and columns are 1-based. `last_line`/`last_column` point one past
/// the final character, so a single-character token at column 5 spans
/// columns 5..6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub first_line: u32,
    pub first_column: u32,
    pub last_line: u32,
    pub last_column: u32,
}

impl Location {
    /// Span covering everything from the start of `self` to the end of `end`.
    pub fn to(self, end: Location) -> Location {
        Location {
            first_line: self.first_line,
            first_column: self.first_column,
            last_line: end.last_line,
            last_column: end.last_column,
        }
    }
}

/// The kind of a lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Identifier or path command letter.
    Name,
    /// Numeric literal (unsigned; signs belong to the grammar).
    Number,
    /// String literal; the token text is the unquoted, unescaped value.
    Str,

    // Keywords
    Prop,
    Set,
    For,
    In,
    If,
    Else,
    Import,
    As,
    Def,
    Not,
    And,
    Or,
    Default,

    // Punctuation and operators
    Comma,
    Semi,
    Colon,
    LParen,
    RParen,
    LBrace,
    RBrace,
    DotDot,
    Le,
    Ge,
    Lt,
    Gt,
    Eq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    /// End-of-input sentinel; always the final token of a stream.
    Eof,
}

impl TokenKind {
    /// Human-readable description used in parse error messages.
    pub fn describe(self) -> &'static str {
        match self {
            TokenKind::Name => "a name",
            TokenKind::Number => "a number",
            TokenKind::Str => "a string",
            TokenKind::Prop => "`prop`",
            TokenKind::Set => "`set`",
            TokenKind::For => "`for`",
            TokenKind::In => "`in`",
            TokenKind::If => "`if`",
            TokenKind::Else => "`else`",
            TokenKind::Import => "`import`",
            TokenKind::As => "`as`",
            TokenKind::Def => "`def`",
            TokenKind::Not => "`not`",
            TokenKind::And => "`and`",
            TokenKind::Or => "`or`",
            TokenKind::Default => "`default`",
            TokenKind::Comma => "`,`",
            TokenKind::Semi => "`;`",
            TokenKind::Colon => "`:`",
            TokenKind::LParen => "`(`",
            TokenKind::RParen => "`)`",
            TokenKind::LBrace => "`{`",
            TokenKind::RBrace => "`}`",
            TokenKind::DotDot => "`..`",
            TokenKind::Le => "`<=`",
            TokenKind::Ge => "`>=`",
            TokenKind::Lt => "`<`",
            TokenKind::Gt => "`>`",
            TokenKind::Eq => "`=`",
            TokenKind::Plus => "`+`",
            TokenKind::Minus => "`-`",
            TokenKind::Star => "`*`",
            TokenKind::Slash => "`/`",
            TokenKind::Percent => "`%`",
            TokenKind::Eof => "end of input",
        }
    }
}

/// A located lexical token.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// The lexeme; for strings, the processed value without quotes.
    pub text: String,
    pub loc: Location,
}

/// SVG path command letters. A single one of these not followed by another
/// letter or `_` lexes as its own one-character name, which is what lets
/// `M0,0Z` tokenize the way SVG path data does.
pub(crate) fn is_path_letter(c: char) -> bool {
    matches!(
        c,
        'M' | 'm'
            | 'Z'
            | 'z'
            | 'L'
            | 'l'
            | 'H'
            | 'h'
            | 'V'
            | 'v'
            | 'C'
            | 'c'
            | 'S'
            | 's'
            | 'Q'
            | 'q'
            | 'T'
            | 't'
            | 'A'
            | 'a'
    )
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn keyword(text: &str) -> Option<TokenKind> {
    Some(match text {
        "prop" => TokenKind::Prop,
        "set" => TokenKind::Set,
        "for" => TokenKind::For,
        "in" => TokenKind::In,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "import" => TokenKind::Import,
        "as" => TokenKind::As,
        "def" => TokenKind::Def,
        "not" => TokenKind::Not,
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "default" => TokenKind::Default,
        _ => return None,
    })
}

/// Lazily tokenize `source`.
///
/// The returned iterator yields every token in order, ends with a single
/// [`TokenKind::Eof`] sentinel, and is restartable: calling `tokenize` again
/// on the same source yields the same sequence.
pub fn tokenize(source: &str) -> Tokenizer<'_> {
    Tokenizer::new(source)
}

/// Iterator over the tokens of one source text.
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
    line: u32,
    column: u32,
    done: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(src: &'a str) -> Self {
        Tokenizer {
            src,
            pos: 0,
            line: 1,
            column: 1,
            done: false,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.src[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\r' | '\n')) {
            self.bump();
        }
    }

    fn token_from(&self, kind: TokenKind, start: (u32, u32, usize)) -> Token {
        let (first_line, first_column, start_pos) = start;
        Token {
            kind,
            text: self.src[start_pos..self.pos].to_string(),
            loc: Location {
                first_line,
                first_column,
                last_line: self.line,
                last_column: self.column,
            },
        }
    }

    fn lex_number(&mut self, start: (u32, u32, usize)) -> Token {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        // Only consume the dot when a digit follows, so `1..3` stays a range.
        if self.peek() == Some('.') && self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
        }
        self.token_from(TokenKind::Number, start)
    }

    fn lex_name(&mut self, start: (u32, u32, usize)) -> Token {
        let first = self.bump().unwrap_or_default();
        // A path letter stands alone unless it is the start of a longer
        // identifier; a digit after it belongs to the next number token.
        let single = is_path_letter(first)
            && !self
                .peek()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if !single {
            while self.peek().is_some_and(is_name_continue) {
                self.bump();
            }
        }
        let mut token = self.token_from(TokenKind::Name, start);
        if let Some(kind) = keyword(&token.text) {
            token.kind = kind;
        }
        token
    }

    fn lex_string(&mut self, start: (u32, u32, usize)) -> Result<Token, ParseError> {
        let quote = self.bump().unwrap_or('"');
        let mut value = String::new();
        loop {
            match self.bump() {
                None => {
                    return Err(ParseError::UnterminatedString {
                        line: start.0,
                        column: start.1,
                        file: None,
                    });
                }
                Some(c) if c == quote => break,
                Some('\\') => match self.bump() {
                    None => {
                        return Err(ParseError::UnterminatedString {
                            line: start.0,
                            column: start.1,
                            file: None,
                        });
                    }
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some(other) => value.push(other),
                },
                Some(c) => value.push(c),
            }
        }
        let mut token = self.token_from(TokenKind::Str, start);
        token.text = value;
        Ok(token)
    }

    fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_whitespace();
        let start = (self.line, self.column, self.pos);
        let Some(c) = self.peek() else {
            return Ok(self.token_from(TokenKind::Eof, start));
        };

        if c.is_ascii_digit() {
            return Ok(self.lex_number(start));
        }
        if is_name_start(c) {
            return Ok(self.lex_name(start));
        }
        if c == '"' || c == '\'' {
            return self.lex_string(start);
        }

        let kind = match c {
            '.' => {
                if self.peek_second() == Some('.') {
                    self.bump();
                    self.bump();
                    return Ok(self.token_from(TokenKind::DotDot, start));
                }
                if self.peek_second().is_some_and(|c| c.is_ascii_digit()) {
                    return Ok(self.lex_number(start));
                }
                return Err(ParseError::UnrecognizedCharacter {
                    character: c,
                    line: start.0,
                    column: start.1,
                    file: None,
                });
            }
            '<' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    return Ok(self.token_from(TokenKind::Le, start));
                }
                return Ok(self.token_from(TokenKind::Lt, start));
            }
            '>' => {
                self.bump();
                if self.peek() == Some('=') {
                    self.bump();
                    return Ok(self.token_from(TokenKind::Ge, start));
                }
                return Ok(self.token_from(TokenKind::Gt, start));
            }
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semi,
            ':' => TokenKind::Colon,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '=' => TokenKind::Eq,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            other => {
                return Err(ParseError::UnrecognizedCharacter {
                    character: other,
                    line: start.0,
                    column: start.1,
                    file: None,
                });
            }
        };
        self.bump();
        Ok(self.token_from(kind, start))
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<Token, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.next_token();
        match &item {
            Ok(token) if token.kind == TokenKind::Eof => self.done = true,
            Err(_) => self.done = true,
            _ => {}
        }
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn texts(source: &str) -> Vec<(TokenKind, String)> {
        tokenize(source)
            .map(|t| t.expect("token"))
            .filter(|t| t.kind != TokenKind::Eof)
            .map(|t| (t.kind, t.text))
            .collect()
    }

    #[test]
    fn separators_do_not_change_the_stream() {
        let expected = texts("M 0,0\nZ");
        assert_eq!(texts("M0,0Z"), expected);
        assert_eq!(texts("M 0, 0 Z"), expected);
        assert_eq!(
            expected,
            vec![
                (TokenKind::Name, "M".to_string()),
                (TokenKind::Number, "0".to_string()),
                (TokenKind::Comma, ",".to_string()),
                (TokenKind::Number, "0".to_string()),
                (TokenKind::Name, "Z".to_string()),
            ]
        );
    }

    #[test]
    fn repeated_command_letters_tokenize_flat() {
        let kinds: Vec<_> = texts("M0,0 L1,2 3,4 Z")
            .into_iter()
            .filter(|(k, _)| *k == TokenKind::Name)
            .map(|(_, t)| t)
            .collect();
        assert_eq!(kinds, vec!["M", "L", "Z"]);
    }

    #[test]
    fn path_letter_splits_before_a_digit_but_identifiers_stay_whole() {
        assert_eq!(
            texts("h2"),
            vec![
                (TokenKind::Name, "h".to_string()),
                (TokenKind::Number, "2".to_string()),
            ]
        );
        assert_eq!(texts("atan2"), vec![(TokenKind::Name, "atan2".to_string())]);
        assert_eq!(texts("x2"), vec![(TokenKind::Name, "x2".to_string())]);
        assert_eq!(texts("ab"), vec![(TokenKind::Name, "ab".to_string())]);
    }

    #[test]
    fn range_is_not_a_decimal() {
        assert_eq!(
            texts("1..3"),
            vec![
                (TokenKind::Number, "1".to_string()),
                (TokenKind::DotDot, "..".to_string()),
                (TokenKind::Number, "3".to_string()),
            ]
        );
        assert_eq!(texts("1.5"), vec![(TokenKind::Number, "1.5".to_string())]);
        assert_eq!(texts(".5"), vec![(TokenKind::Number, ".5".to_string())]);
    }

    #[test]
    fn keywords_are_distinguished_from_names() {
        assert_eq!(
            texts("for flow in"),
            vec![
                (TokenKind::For, "for".to_string()),
                (TokenKind::Name, "flow".to_string()),
                (TokenKind::In, "in".to_string()),
            ]
        );
    }

    #[test]
    fn string_literals_unquote_and_unescape() {
        assert_eq!(
            texts(r#"import "lib/arrow.path""#),
            vec![
                (TokenKind::Import, "import".to_string()),
                (TokenKind::Str, "lib/arrow.path".to_string()),
            ]
        );
        assert_eq!(texts(r#""a\"b""#), vec![(TokenKind::Str, "a\"b".to_string())]);
        assert_eq!(texts("'ok'"), vec![(TokenKind::Str, "ok".to_string())]);
    }

    #[test]
    fn unterminated_string_reports_its_opening_quote() {
        let err = tokenize("M 0,0 \"oops")
            .find_map(Result::err)
            .expect("lex error");
        assert_eq!(
            err,
            ParseError::UnterminatedString {
                line: 1,
                column: 7,
                file: None
            }
        );
    }

    #[test]
    fn unrecognized_character_reports_line_and_column() {
        let err = tokenize("M 0,0\n  @").find_map(Result::err).expect("lex error");
        assert_eq!(
            err,
            ParseError::UnrecognizedCharacter {
                character: '@',
                line: 2,
                column: 3,
                file: None
            }
        );
    }

    #[test]
    fn locations_are_one_based_and_end_exclusive() {
        let tokens: Vec<_> = tokenize("M 10\nZ").map(|t| t.expect("token")).collect();
        assert_eq!(tokens[0].loc.first_line, 1);
        assert_eq!(tokens[0].loc.first_column, 1);
        assert_eq!(tokens[0].loc.last_column, 2);
        assert_eq!(tokens[1].loc.first_column, 3);
        assert_eq!(tokens[1].loc.last_column, 5);
        assert_eq!(tokens[2].loc.first_line, 2);
        assert_eq!(tokens[2].loc.first_column, 1);
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
    }

    #[test]
    fn restartable_over_the_same_source() {
        let source = "for i in 1..3 { M i,0 }";
        let a: Vec<_> = tokenize(source).map(|t| t.expect("token")).collect();
        let b: Vec<_> = tokenize(source).map(|t| t.expect("token")).collect();
        assert_eq!(a, b);
    }
}
