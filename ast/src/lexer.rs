//! Source text to token stream.
//!
//! Single-pass, tracks `(offset, line, column)` as it advances. Comments are
//! consumed and never reach the token stream; an unterminated block comment
//! silently terminates at EOF per the language's lexical rules.

use crate::errors::LexError;
use crate::token::{Keyword, NumberSuffix, Operator, Punct, Span, Token, TokenKind};

pub struct Lexer<'src> {
    src: &'src [u8],
    offset: u32,
    line: u32,
    column: u32,
}

impl<'src> Lexer<'src> {
    #[must_use]
    pub fn new(src: &'src str) -> Self {
        Lexer {
            src: src.as_bytes(),
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    /// Tokenizes the whole source, stopping at the first lexical error.
    ///
    /// # Errors
    ///
    /// Returns the first `LexError` encountered.
    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let start = self.mark();
            let Some(ch) = self.peek() else {
                tokens.push(Token {
                    kind: TokenKind::Eof,
                    span: self.span_from(start),
                });
                break;
            };
            let token = self.next_token(ch, start)?;
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn next_token(&mut self, ch: char, start: Mark) -> Result<Token, LexError> {
        let kind = match ch {
            c if c.is_ascii_digit() => self.lex_number(start)?,
            c if is_ident_start(c) => self.lex_identifier_or_keyword(),
            '#' => {
                self.bump();
                let name = self.take_while(is_ident_continue);
                TokenKind::PrivateName(name)
            }
            ':' if self.peek_at(1).is_some_and(is_ident_start) => {
                self.bump();
                let name = self.take_while(is_ident_continue);
                TokenKind::SymbolRef(name)
            }
            '"' | '\'' => self.lex_string(ch, start)?,
            '`' => self.lex_template_head(start)?,
            _ => self.lex_operator_or_punct(start)?,
        };
        Ok(Token {
            kind,
            span: self.span_from(start),
        })
    }

    fn lex_identifier_or_keyword(&mut self) -> TokenKind {
        let text = self.take_while(is_ident_continue);
        keyword_of(&text).map_or(TokenKind::Identifier(text), TokenKind::Keyword)
    }

    fn lex_number(&mut self, start: Mark) -> Result<TokenKind, LexError> {
        let mut text = self.take_while(|c| c.is_ascii_digit());
        let mut is_float = false;
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.bump();
            text.push('.');
            text.push_str(&self.take_while(|c| c.is_ascii_digit()));
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            is_float = true;
            text.push(self.bump().unwrap());
            if matches!(self.peek(), Some('+' | '-')) {
                text.push(self.bump().unwrap());
            }
            text.push_str(&self.take_while(|c| c.is_ascii_digit()));
        }
        let suffix = self.lex_number_suffix(start, &text)?;
        if is_float {
            Ok(TokenKind::Float { text, suffix })
        } else {
            Ok(TokenKind::Integer { text, suffix })
        }
    }

    fn lex_number_suffix(&mut self, start: Mark, text: &str) -> Result<NumberSuffix, LexError> {
        // Numeric suffixes such as `as i64` are parsed by the parser as casts,
        // not recognised lexically; this lexer only ever produces `None`.
        let _ = (start, text);
        Ok(NumberSuffix::None)
    }

    fn lex_string(&mut self, quote: char, start: Mark) -> Result<TokenKind, LexError> {
        self.bump();
        let mut value = String::new();
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(LexError::UnterminatedString {
                        span: self.span_from(start),
                    });
                }
                Some(c) if c == quote => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    value.push(self.lex_escape(start)?);
                }
                Some(c) => {
                    self.bump();
                    value.push(c);
                }
            }
        }
        Ok(TokenKind::String(value))
    }

    fn lex_escape(&mut self, start: Mark) -> Result<char, LexError> {
        match self.bump() {
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('r') => Ok('\r'),
            Some('0') => Ok('\0'),
            Some(c @ ('\\' | '\'' | '"' | '`' | '$')) => Ok(c),
            Some(c) => Err(LexError::InvalidEscape {
                ch: c,
                span: self.span_from(start),
            }),
            None => Err(LexError::UnterminatedString {
                span: self.span_from(start),
            }),
        }
    }

    /// Lexes the leading ``` `...${ ``` or `` `...` `` piece of a template literal.
    /// Interior `${expr}` pieces are re-entered by the parser, which calls back
    /// into [`Lexer::continue_template`] after consuming the embedded expression.
    fn lex_template_head(&mut self, start: Mark) -> Result<TokenKind, LexError> {
        self.bump();
        let (text, terminator) = self.lex_template_body(start)?;
        Ok(match terminator {
            TemplateTerminator::Backtick => TokenKind::NoSubstitutionTemplate(text),
            TemplateTerminator::Substitution => TokenKind::TemplateHead(text),
        })
    }

    /// Resumes lexing a template literal after a `}` that closed an embedded
    /// expression; produces either a middle or tail piece.
    pub fn continue_template(&mut self) -> Result<Token, LexError> {
        let start = self.mark();
        let (text, terminator) = self.lex_template_body(start)?;
        let kind = match terminator {
            TemplateTerminator::Backtick => TokenKind::TemplateTail(text),
            TemplateTerminator::Substitution => TokenKind::TemplateMiddle(text),
        };
        Ok(Token {
            kind,
            span: self.span_from(start),
        })
    }

    fn lex_template_body(
        &mut self,
        start: Mark,
    ) -> Result<(String, TemplateTerminator), LexError> {
        let mut value = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(LexError::UnterminatedTemplate {
                        span: self.span_from(start),
                    });
                }
                Some('`') => {
                    self.bump();
                    return Ok((value, TemplateTerminator::Backtick));
                }
                Some('$') if self.peek_at(1) == Some('{') => {
                    self.bump();
                    self.bump();
                    return Ok((value, TemplateTerminator::Substitution));
                }
                Some('\\') => {
                    self.bump();
                    value.push(self.lex_escape(start)?);
                }
                Some(c) => {
                    self.bump();
                    value.push(c);
                }
            }
        }
    }

    fn lex_operator_or_punct(&mut self, start: Mark) -> Result<TokenKind, LexError> {
        let two = (self.peek(), self.peek_at(1));
        let kind = match two {
            (Some('='), Some('=')) => self.take2(Operator::Eq),
            (Some('!'), Some('=')) => self.take2(Operator::Ne),
            (Some('<'), Some('=')) => self.take2(Operator::Le),
            (Some('>'), Some('=')) => self.take2(Operator::Ge),
            (Some('='), Some('>')) => self.take2(Operator::Arrow),
            (Some('.'), Some('.')) => self.take2(Operator::DotDot),
            (Some('*'), Some('*')) => self.take2(Operator::StarStar),
            (Some('&'), Some('&')) => self.take2(Operator::AndAnd),
            (Some('|'), Some('|')) => self.take2(Operator::OrOr),
            (Some('<'), Some('<')) => self.take2(Operator::Shl),
            (Some('>'), Some('>')) => self.take2(Operator::Shr),
            _ => {
                let ch = self.bump().expect("checked by caller");
                match ch {
                    '<' => TokenKind::Operator(Operator::Lt),
                    '>' => TokenKind::Operator(Operator::Gt),
                    '&' => TokenKind::Operator(Operator::Amp),
                    '|' => TokenKind::Operator(Operator::Pipe),
                    '^' => TokenKind::Operator(Operator::Caret),
                    '+' => TokenKind::Operator(Operator::Plus),
                    '-' => TokenKind::Operator(Operator::Minus),
                    '*' => TokenKind::Operator(Operator::Star),
                    '/' => TokenKind::Operator(Operator::Slash),
                    '%' => TokenKind::Operator(Operator::Percent),
                    '!' => TokenKind::Operator(Operator::Bang),
                    '=' => TokenKind::Operator(Operator::Assign),
                    '(' => TokenKind::Punct(Punct::LParen),
                    ')' => TokenKind::Punct(Punct::RParen),
                    '{' => TokenKind::Punct(Punct::LBrace),
                    '}' => TokenKind::Punct(Punct::RBrace),
                    '[' => TokenKind::Punct(Punct::LBracket),
                    ']' => TokenKind::Punct(Punct::RBracket),
                    ',' => TokenKind::Punct(Punct::Comma),
                    ':' => TokenKind::Punct(Punct::Colon),
                    ';' => TokenKind::Punct(Punct::Semicolon),
                    '.' => TokenKind::Punct(Punct::Dot),
                    '@' => TokenKind::Punct(Punct::At),
                    '?' => TokenKind::Punct(Punct::Question),
                    '_' => TokenKind::Punct(Punct::Underscore),
                    other => {
                        return Err(LexError::UnexpectedChar {
                            ch: other,
                            span: self.span_from(start),
                        });
                    }
                }
            }
        };
        Ok(kind)
    }

    fn take2(&mut self, op: Operator) -> TokenKind {
        self.bump();
        self.bump();
        TokenKind::Operator(op)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.bump();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            None => break,
                            Some('*') if self.peek_at(1) == Some('/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            _ => {
                                self.bump();
                            }
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let mut s = String::new();
        while let Some(c) = self.peek() {
            if pred(c) {
                s.push(c);
                self.bump();
            } else {
                break;
            }
        }
        s
    }

    fn mark(&self) -> Mark {
        Mark {
            offset: self.offset,
            line: self.line,
            column: self.column,
        }
    }

    fn span_from(&self, start: Mark) -> Span {
        Span {
            start: start.offset,
            end: self.offset,
            line: start.line,
            column: start.column,
        }
    }

    fn peek(&self) -> Option<char> {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> Option<char> {
        std::str::from_utf8(&self.src[self.offset as usize..])
            .ok()
            .and_then(|s| s.chars().nth(n))
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.offset += u32::try_from(ch.len_utf8()).unwrap_or(1);
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }
}

#[derive(Clone, Copy)]
struct Mark {
    offset: u32,
    line: u32,
    column: u32,
}

enum TemplateTerminator {
    Backtick,
    Substitution,
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn keyword_of(text: &str) -> Option<Keyword> {
    Some(match text {
        "let" => Keyword::Let,
        "var" => Keyword::Var,
        "fn" => Keyword::Fn,
        "class" => Keyword::Class,
        "interface" => Keyword::Interface,
        "mixin" => Keyword::Mixin,
        "enum" => Keyword::Enum,
        "symbol" => Keyword::Symbol,
        "type" => Keyword::Type,
        "distinct" => Keyword::Distinct,
        "extends" => Keyword::Extends,
        "implements" => Keyword::Implements,
        "import" => Keyword::Import,
        "export" => Keyword::Export,
        "from" => Keyword::From,
        "declare" => Keyword::Declare,
        "return" => Keyword::Return,
        "if" => Keyword::If,
        "else" => Keyword::Else,
        "for" => Keyword::For,
        "while" => Keyword::While,
        "match" => Keyword::Match,
        "case" => Keyword::Case,
        "throw" => Keyword::Throw,
        "new" => Keyword::New,
        "super" => Keyword::Super,
        "this" => Keyword::This,
        "as" => Keyword::As,
        "is" => Keyword::Is,
        "null" => Keyword::Null,
        "true" => Keyword::True,
        "false" => Keyword::False,
        _ => return None,
    })
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
    fn lexes_keywords_and_identifiers() {
        assert_eq!(
            kinds("let x"),
            vec![
                TokenKind::Keyword(Keyword::Let),
                TokenKind::Identifier("x".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_multi_char_operators_greedily() {
        assert_eq!(
            kinds("a <= b"),
            vec![
                TokenKind::Identifier("a".to_string()),
                TokenKind::Operator(Operator::Le),
                TokenKind::Identifier("b".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_range_operator_distinct_from_dot() {
        assert_eq!(
            kinds("a..b"),
            vec![
                TokenKind::Identifier("a".to_string()),
                TokenKind::Operator(Operator::DotDot),
                TokenKind::Identifier("b".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn line_and_column_track_newlines() {
        let tokens = Lexer::new("a\nb").tokenize().unwrap();
        assert_eq!(tokens[0].span.line, 1);
        assert_eq!(tokens[1].span.line, 2);
        assert_eq!(tokens[1].span.column, 1);
    }

    #[test]
    fn skips_line_and_block_comments() {
        assert_eq!(
            kinds("a // comment\n/* block */ b"),
            vec![
                TokenKind::Identifier("a".to_string()),
                TokenKind::Identifier("b".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_block_comment_reaches_eof_silently() {
        assert_eq!(kinds("a /* never closed"), vec![
            TokenKind::Identifier("a".to_string()),
            TokenKind::Eof,
        ]);
    }

    #[test]
    fn lexes_symbol_reference_and_private_name() {
        assert_eq!(
            kinds(":ok #priv"),
            vec![
                TokenKind::SymbolRef("ok".to_string()),
                TokenKind::PrivateName("priv".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_string_with_escapes() {
        assert_eq!(
            kinds(r#""a\nb""#),
            vec![TokenKind::String("a\nb".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        assert!(Lexer::new("\"abc").tokenize().is_err());
    }

    #[test]
    fn lexes_no_substitution_template() {
        assert_eq!(
            kinds("`hello`"),
            vec![
                TokenKind::NoSubstitutionTemplate("hello".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn lexes_template_head() {
        assert_eq!(
            kinds("`a${"),
            vec![TokenKind::TemplateHead("a".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn lexes_float_literal() {
        assert_eq!(
            kinds("1.5"),
            vec![
                TokenKind::Float {
                    text: "1.5".to_string(),
                    suffix: NumberSuffix::None
                },
                TokenKind::Eof,
            ]
        );
    }
}
