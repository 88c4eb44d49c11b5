use crate::token::{Tok, TokKind};
use cirrus_ast::span::Span;

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
        }
    }

    fn bump(&mut self) -> Option<u8> {
        if self.pos >= self.src.len() {
            None
        } else {
            let b = self.src[self.pos];
            self.pos += 1;
            Some(b)
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }
    fn peek2(&self) -> Option<u8> {
        self.src.get(self.pos + 1).copied()
    }

    fn span(&self, start: usize) -> Span {
        Span {
            start: start as u32,
            end: self.pos as u32,
        }
    }

    fn tok(&self, kind: TokKind, start: usize) -> Tok {
        Tok {
            kind,
            span: self.span(start),
        }
    }

    fn skip_ws_and_comments(&mut self) {
        loop {
            while matches!(self.peek(), Some(b) if (b as char).is_whitespace()) {
                self.bump();
            }
            // line comment: //
            if self.peek() == Some(b'/') && self.peek2() == Some(b'/') {
                while let Some(b) = self.peek() {
                    if b == b'\n' {
                        break;
                    }
                    self.bump();
                }
                continue;
            }
            // block comment: /* ... */ (unterminated runs to eof)
            if self.peek() == Some(b'/') && self.peek2() == Some(b'*') {
                self.bump();
                self.bump();
                while self.peek().is_some() {
                    if self.peek() == Some(b'*') && self.peek2() == Some(b'/') {
                        self.bump();
                        self.bump();
                        break;
                    }
                    self.bump();
                }
                continue;
            }
            break;
        }
    }

    pub fn next_tok(&mut self) -> Tok {
        self.skip_ws_and_comments();
        let start = self.pos;
        let Some(b) = self.bump() else {
            return Tok {
                kind: TokKind::Eof,
                span: Span {
                    start: self.pos as u32,
                    end: self.pos as u32,
                },
            };
        };
        let c = b as char;

        // 2-char operators first
        let double = match (c, self.peek()) {
            ('&', Some(b'&')) => Some(TokKind::AndAnd),
            ('|', Some(b'|')) => Some(TokKind::OrOr),
            ('=', Some(b'=')) => Some(TokKind::EqEq),
            ('!', Some(b'=')) => Some(TokKind::BangEq),
            ('<', Some(b'=')) => Some(TokKind::Le),
            ('>', Some(b'=')) => Some(TokKind::Ge),
            _ => None,
        };
        if let Some(k) = double {
            self.bump();
            return self.tok(k, start);
        }

        // 1-char punctuation/operators
        let single = match c {
            '(' => Some(TokKind::LParen),
            ')' => Some(TokKind::RParen),
            '{' => Some(TokKind::LBrace),
            '}' => Some(TokKind::RBrace),
            '[' => Some(TokKind::LBracket),
            ']' => Some(TokKind::RBracket),
            ',' => Some(TokKind::Comma),
            ':' => Some(TokKind::Colon),
            ';' => Some(TokKind::Semicolon),
            '.' => Some(TokKind::Dot),
            '@' => Some(TokKind::At),
            '|' => Some(TokKind::Pipe),
            '+' => Some(TokKind::Plus),
            '-' => Some(TokKind::Minus),
            '*' => Some(TokKind::Star),
            '/' => Some(TokKind::Slash),
            '=' => Some(TokKind::Eq),
            '<' => Some(TokKind::Lt),
            '>' => Some(TokKind::Gt),
            '!' => Some(TokKind::Bang),
            _ => None,
        };
        if let Some(k) = single {
            return self.tok(k, start);
        }

        // string, either quote style
        if c == '"' || c == '\'' {
            return self.lex_string(b, start);
        }

        if c.is_ascii_digit() {
            return self.lex_number(start);
        }

        // ident / keywords
        if c.is_ascii_alphabetic() || c == '_' {
            while matches!(self.peek(), Some(p) if p.is_ascii_alphanumeric() || p == b'_') {
                self.bump();
            }
            let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
            let kind = match text.as_str() {
                "schema" => TokKind::KwSchema,
                "resource" => TokKind::KwResource,
                "component" => TokKind::KwComponent,
                "input" => TokKind::KwInput,
                "output" => TokKind::KwOutput,
                "var" => TokKind::KwVar,
                "fun" => TokKind::KwFun,
                "type" => TokKind::KwType,
                "true" => TokKind::KwTrue,
                "false" => TokKind::KwFalse,
                "null" => TokKind::KwNull,
                _ => TokKind::Ident(text),
            };
            return self.tok(kind, start);
        }

        self.tok(TokKind::Error(format!("unexpected character '{}'", c)), start)
    }

    fn lex_string(&mut self, quote: u8, start: usize) -> Tok {
        let mut bytes = Vec::new();
        loop {
            let Some(b) = self.bump() else {
                return self.tok(TokKind::Error("unterminated string".to_string()), start);
            };
            if b == quote {
                break;
            }
            if b == b'\\' {
                let Some(esc) = self.bump() else {
                    return self.tok(TokKind::Error("unterminated string".to_string()), start);
                };
                bytes.push(match esc {
                    b'n' => b'\n',
                    b't' => b'\t',
                    other => other,
                });
            } else {
                bytes.push(b);
            }
        }
        let s = String::from_utf8_lossy(&bytes).into_owned();
        self.tok(TokKind::Str(s), start)
    }

    fn lex_number(&mut self, start: usize) -> Tok {
        let mut dot = false;
        while let Some(p) = self.peek() {
            if p.is_ascii_digit() {
                self.bump();
            } else if p == b'.' && !dot && matches!(self.peek2(), Some(d) if d.is_ascii_digit()) {
                dot = true;
                self.bump();
            } else {
                break;
            }
        }
        let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
        let kind = if dot {
            text.parse().map(TokKind::Float).ok()
        } else {
            text.parse().map(TokKind::Int).ok()
        };
        let kind = kind.unwrap_or_else(|| TokKind::Error(format!("invalid number '{}'", text)));
        self.tok(kind, start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokKind> {
        let mut lex = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let t = lex.next_tok();
            if t.kind == TokKind::Eof {
                break;
            }
            out.push(t.kind);
        }
        out
    }

    #[test]
    fn member_access_is_not_a_float() {
        assert_eq!(
            kinds("vm.first 1.5"),
            vec![
                TokKind::Ident("vm".into()),
                TokKind::Dot,
                TokKind::Ident("first".into()),
                TokKind::Float(1.5),
            ]
        );
    }

    #[test]
    fn both_quote_styles_and_comments() {
        assert_eq!(
            kinds("'a' /* skip */ \"b\" // tail"),
            vec![TokKind::Str("a".into()), TokKind::Str("b".into())]
        );
    }

    #[test]
    fn unterminated_string_is_error_token() {
        assert!(matches!(kinds("'abc")[0], TokKind::Error(_)));
    }

    #[test]
    fn non_ascii_string_survives() {
        assert_eq!(kinds("'zürich'"), vec![TokKind::Str("zürich".into())]);
    }
}
