//! Source text → token stream (A1).
//!
//! A hand-written single-pass scanner. Not part of THE CORE per `spec.md` §1
//! ("tokenisation… treated as an external collaborator"); kept deliberately
//! simple so the evaluator underneath it has something real to run against.

use crate::{
    error::{EarlError, EarlResult},
    token::{SourceLoc, Token, TokenKind},
};

pub struct Lexer<'src> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    col: u32,
    _src: &'src str,
}

impl<'src> Lexer<'src> {
    pub fn new(src: &'src str) -> Self {
        Self {
            chars: src.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            _src: src,
        }
    }

    pub fn tokenize(mut self) -> EarlResult<Vec<Token>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let loc = self.loc();
            let Some(c) = self.peek() else {
                tokens.push(Token::new(TokenKind::Eof, "", loc));
                break;
            };
            let token = if c.is_ascii_digit() {
                self.lex_number(loc)?
            } else if c == '"' {
                self.lex_string(loc)?
            } else if c == '\'' {
                self.lex_char(loc)?
            } else if is_ident_start(c) {
                self.lex_ident_or_keyword(loc)
            } else {
                self.lex_operator(loc)?
            };
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn loc(&self) -> SourceLoc {
        SourceLoc {
            line: self.line,
            col: self.col,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('#') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn lex_number(&mut self, loc: SourceLoc) -> EarlResult<Token> {
        let mut lexeme = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                lexeme.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let value = lexeme
            .parse::<i64>()
            .map_err(|e| EarlError::syntax(format!("invalid integer literal `{lexeme}`: {e}"), loc))?;
        Ok(Token::new(TokenKind::Int(value), lexeme, loc))
    }

    fn lex_string(&mut self, loc: SourceLoc) -> EarlResult<Token> {
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.advance() {
                None => return Err(EarlError::syntax("unterminated string literal", loc)),
                Some('"') => break,
                Some('\\') => value.push(self.lex_escape(loc)?),
                Some(c) => value.push(c),
            }
        }
        Ok(Token::new(TokenKind::Str(value.clone()), value, loc))
    }

    fn lex_char(&mut self, loc: SourceLoc) -> EarlResult<Token> {
        self.advance(); // opening quote
        let c = match self.advance() {
            None => return Err(EarlError::syntax("unterminated char literal", loc)),
            Some('\\') => self.lex_escape(loc)?,
            Some(c) => c,
        };
        match self.advance() {
            Some('\'') => {}
            _ => return Err(EarlError::syntax("char literal must hold exactly one codepoint", loc)),
        }
        Ok(Token::new(TokenKind::Char(c), c.to_string(), loc))
    }

    fn lex_escape(&mut self, loc: SourceLoc) -> EarlResult<char> {
        match self.advance() {
            Some('n') => Ok('\n'),
            Some('t') => Ok('\t'),
            Some('r') => Ok('\r'),
            Some('\\') => Ok('\\'),
            Some('"') => Ok('"'),
            Some('\'') => Ok('\''),
            Some('0') => Ok('\0'),
            Some(other) => Err(EarlError::syntax(format!("unknown escape `\\{other}`"), loc)),
            None => Err(EarlError::syntax("unterminated escape sequence", loc)),
        }
    }

    fn lex_ident_or_keyword(&mut self, loc: SourceLoc) -> Token {
        let mut lexeme = String::new();
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                lexeme.push(c);
                self.advance();
            } else {
                break;
            }
        }
        let kind = match lexeme.as_str() {
            "let" => TokenKind::Let,
            "mut" => TokenKind::Mut,
            "const" => TokenKind::Const,
            "world" => TokenKind::World,
            "pub" => TokenKind::Pub,
            "ref" => TokenKind::Ref,
            "def" => TokenKind::Def,
            "class" => TokenKind::Class,
            "import" => TokenKind::Import,
            "module" => TokenKind::Module,
            "as" => TokenKind::As,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "while" => TokenKind::While,
            "for" => TokenKind::For,
            "foreach" => TokenKind::Foreach,
            "in" => TokenKind::In,
            "break" => TokenKind::Break,
            "continue" => TokenKind::Continue,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "None" => TokenKind::NoneLit,
            "Some" => TokenKind::Some_,
            _ => TokenKind::Ident(lexeme.clone()),
        };
        Token::new(kind, lexeme, loc)
    }

    fn lex_operator(&mut self, loc: SourceLoc) -> EarlResult<Token> {
        let c = self.advance().expect("checked by caller");
        macro_rules! two {
            ($next:expr, $two_kind:expr, $one_kind:expr) => {
                if self.peek() == Some($next) {
                    self.advance();
                    $two_kind
                } else {
                    $one_kind
                }
            };
        }
        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ',' => TokenKind::Comma,
            ':' => two!(':', TokenKind::ColonColon, TokenKind::Colon),
            ';' => TokenKind::Semi,
            '@' => TokenKind::At,
            '|' => two!('|', TokenKind::OrOr, TokenKind::Pipe),
            '.' => TokenKind::Dot,
            '+' => two!('=', TokenKind::PlusEq, TokenKind::Plus),
            '-' => {
                if self.peek() == Some('>') {
                    self.advance();
                    TokenKind::Arrow
                } else {
                    two!('=', TokenKind::MinusEq, TokenKind::Minus)
                }
            }
            '*' => two!('=', TokenKind::StarEq, TokenKind::Star),
            '/' => two!('=', TokenKind::SlashEq, TokenKind::Slash),
            '%' => two!('=', TokenKind::PercentEq, TokenKind::Percent),
            '=' => two!('=', TokenKind::EqEq, TokenKind::Eq),
            '!' => two!('=', TokenKind::BangEq, TokenKind::Bang),
            '<' => two!('=', TokenKind::Le, TokenKind::Lt),
            '>' => two!('=', TokenKind::Ge, TokenKind::Gt),
            '&' => {
                if self.peek() == Some('&') {
                    self.advance();
                    TokenKind::AndAnd
                } else {
                    return Err(EarlError::syntax("unexpected character `&`", loc));
                }
            }
            other => return Err(EarlError::syntax(format!("unexpected character `{other}`"), loc)),
        };
        Ok(Token::new(kind, c.to_string(), loc))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
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
    fn lexes_let_binding() {
        let kinds = kinds("let x = 1 + 2;");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Let,
                TokenKind::Ident("x".into()),
                TokenKind::Eq,
                TokenKind::Int(1),
                TokenKind::Plus,
                TokenKind::Int(2),
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn tracks_line_and_column_across_newlines() {
        let tokens = Lexer::new("let x = 1;\nlet y = 2;").tokenize().unwrap();
        let y_ident = &tokens[5];
        assert_eq!(y_ident.kind, TokenKind::Ident("y".into()));
        assert_eq!(y_ident.loc.line, 2);
    }

    #[test]
    fn unterminated_string_is_syntax_error() {
        let err = Lexer::new("\"abc").tokenize().unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Syntax);
    }

    #[test]
    fn skips_line_comments() {
        let kinds = kinds("let x = 1; # trailing comment\nlet y = 2;");
        assert!(kinds.contains(&TokenKind::Ident("y".into())));
    }

    #[test]
    fn double_colon_is_distinct_from_colon() {
        let kinds = kinds("Mod::name");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Ident("Mod".into()),
                TokenKind::ColonColon,
                TokenKind::Ident("name".into()),
                TokenKind::Eof,
            ]
        );
    }
}
