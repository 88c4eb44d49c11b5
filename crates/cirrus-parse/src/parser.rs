use crate::lexer::Lexer;
use crate::token::{Tok, TokKind};
use anyhow::{bail, Result};
use cirrus_ast::ast::{
    Annotation, AnnotationArgs, BinOp, ComponentDecl, Decl, Expr, FunDecl, Ident, InputDecl,
    InstanceDecl, Lit, NamedArg, ObjectField, OutputDecl, Param, Program, PropertyInit,
    ResourceDecl, SchemaDecl, SchemaProperty, TypeAliasDecl, TypeExpr, UnOp, VarDecl,
};
use cirrus_ast::span::Span;

/// Maximum expression nesting before the parser gives up (pathological input)
const MAX_NESTING_DEPTH: u32 = 256;

pub fn parse_str(_file: &str, src: &str) -> Result<Program> {
    let mut p = Parser::new(src);
    p.parse_program()
}

struct Parser<'a> {
    lex: Lexer<'a>,
    cur: Tok,
    nxt: Tok,
    /// End offset of the last consumed token
    prev_end: u32,
    depth: u32,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        let mut lex = Lexer::new(src);
        let cur = lex.next_tok();
        let nxt = lex.next_tok();
        Self {
            lex,
            cur,
            nxt,
            prev_end: 0,
            depth: 0,
        }
    }

    fn bump(&mut self) {
        self.prev_end = self.cur.span.end;
        self.cur = std::mem::replace(&mut self.nxt, self.lex.next_tok());
    }

    fn at(&self, k: &TokKind) -> bool {
        std::mem::discriminant(&self.cur.kind) == std::mem::discriminant(k)
    }

    fn expect(&mut self, k: TokKind) -> Result<Tok> {
        if self.at(&k) {
            let t = self.cur.clone();
            self.bump();
            Ok(t)
        } else {
            bail!("expected {:?}, found {:?}", k, self.cur.kind)
        }
    }

    fn span_from(&self, start: u32) -> Span {
        Span {
            start,
            end: self.prev_end,
        }
    }

    /// `;` and `,` are optional between members
    fn skip_separators(&mut self) {
        while matches!(self.cur.kind, TokKind::Semicolon | TokKind::Comma) {
            self.bump();
        }
    }

    // ======= program / declarations =======

    fn parse_program(&mut self) -> Result<Program> {
        let start = self.cur.span.start;
        let mut items = Vec::new();
        loop {
            self.skip_separators();
            if matches!(self.cur.kind, TokKind::Eof) {
                break;
            }
            items.push(self.parse_decl()?);
        }
        Ok(Program {
            items,
            span: Span {
                start,
                end: self.cur.span.end,
            },
        })
    }

    fn parse_decl(&mut self) -> Result<Decl> {
        let start = self.cur.span.start;
        let annotations = self.parse_annotations()?;
        match self.cur.kind {
            TokKind::KwSchema => Ok(Decl::Schema(self.parse_schema(annotations, start)?)),
            TokKind::KwResource => Ok(Decl::Resource(self.parse_resource(annotations, start)?)),
            TokKind::KwComponent => self.parse_component(annotations, start),
            TokKind::KwInput => Ok(Decl::Input(self.parse_input(annotations, start)?)),
            TokKind::KwOutput => Ok(Decl::Output(self.parse_output(annotations, start)?)),
            TokKind::KwVar => Ok(Decl::Var(self.parse_var(annotations, start)?)),
            TokKind::KwFun => Ok(Decl::Fun(self.parse_fun(annotations, start)?)),
            TokKind::KwType => Ok(Decl::TypeAlias(self.parse_alias(annotations, start)?)),
            _ => bail!("expected a declaration, found {:?}", self.cur.kind),
        }
    }

    fn parse_ident(&mut self) -> Result<Ident> {
        match &self.cur.kind {
            TokKind::Ident(s) => {
                let id = Ident {
                    text: s.clone(),
                    span: self.cur.span,
                };
                self.bump();
                Ok(id)
            }
            _ => bail!("expected identifier, found {:?}", self.cur.kind),
        }
    }

    /// Property and object-key names may reuse keywords (`type`, `input`, ...).
    fn parse_name(&mut self) -> Result<Ident> {
        let text = match &self.cur.kind {
            TokKind::Ident(s) | TokKind::Str(s) => s.clone(),
            other => match keyword_text(other) {
                Some(kw) => kw.to_string(),
                None => bail!("expected a name, found {:?}", other),
            },
        };
        let id = Ident {
            text,
            span: self.cur.span,
        };
        self.bump();
        Ok(id)
    }

    fn parse_annotations(&mut self) -> Result<Vec<Annotation>> {
        let mut out = Vec::new();
        while matches!(self.cur.kind, TokKind::At) {
            let start = self.cur.span.start;
            self.bump(); // '@'
            let name = self.parse_ident()?;
            let args = if matches!(self.cur.kind, TokKind::LParen) {
                self.bump();
                let args = self.parse_annotation_args()?;
                self.expect(TokKind::RParen)?;
                args
            } else {
                AnnotationArgs::Bare
            };
            out.push(Annotation {
                name,
                args,
                span: self.span_from(start),
            });
        }
        Ok(out)
    }

    fn parse_annotation_args(&mut self) -> Result<AnnotationArgs> {
        if matches!(self.cur.kind, TokKind::RParen) {
            return Ok(AnnotationArgs::Empty);
        }

        // named form: key = value, ...
        if matches!(self.cur.kind, TokKind::Ident(_)) && matches!(self.nxt.kind, TokKind::Eq) {
            let mut named = Vec::new();
            loop {
                let start = self.cur.span.start;
                let name = self.parse_ident()?;
                self.expect(TokKind::Eq)?;
                let value = self.parse_expr_bp(0)?;
                named.push(NamedArg {
                    name,
                    value,
                    span: self.span_from(start),
                });
                if matches!(self.cur.kind, TokKind::Comma) {
                    self.bump();
                    continue;
                }
                break;
            }
            return Ok(AnnotationArgs::Named(named));
        }

        // positional form; several values collapse into one array
        let start = self.cur.span.start;
        let mut values = vec![self.parse_expr_bp(0)?];
        while matches!(self.cur.kind, TokKind::Comma) {
            self.bump();
            values.push(self.parse_expr_bp(0)?);
        }
        if values.len() == 1 {
            Ok(AnnotationArgs::Value(values.remove(0)))
        } else {
            Ok(AnnotationArgs::Value(Expr::Array {
                items: values,
                span: self.span_from(start),
            }))
        }
    }

    fn parse_schema(&mut self, annotations: Vec<Annotation>, start: u32) -> Result<SchemaDecl> {
        self.expect(TokKind::KwSchema)?;
        let name = self.parse_ident()?;
        self.expect(TokKind::LBrace)?;
        let mut properties = Vec::new();
        loop {
            self.skip_separators();
            if matches!(self.cur.kind, TokKind::RBrace) {
                break;
            }
            let prop_start = self.cur.span.start;
            let prop_annotations = self.parse_annotations()?;
            let ty = self.parse_type()?;
            let prop_name = self.parse_name()?;
            let default = self.parse_optional_initializer()?;
            properties.push(SchemaProperty {
                annotations: prop_annotations,
                ty,
                name: prop_name,
                default,
                span: self.span_from(prop_start),
            });
        }
        self.expect(TokKind::RBrace)?;
        Ok(SchemaDecl {
            annotations,
            name,
            properties,
            span: self.span_from(start),
        })
    }

    fn parse_resource(&mut self, annotations: Vec<Annotation>, start: u32) -> Result<ResourceDecl> {
        self.expect(TokKind::KwResource)?;
        let schema = self.parse_ident()?;
        let name = self.parse_ident()?;
        let body = self.parse_inits()?;
        Ok(ResourceDecl {
            annotations,
            schema,
            name,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_component(&mut self, annotations: Vec<Annotation>, start: u32) -> Result<Decl> {
        self.expect(TokKind::KwComponent)?;
        let type_name = self.parse_ident()?;

        // `component app web { ... }` instantiates; `component app { ... }` defines
        if matches!(self.cur.kind, TokKind::Ident(_)) {
            let name = self.parse_ident()?;
            let body = self.parse_inits()?;
            return Ok(Decl::Instance(InstanceDecl {
                annotations,
                component: type_name,
                name,
                body,
                span: self.span_from(start),
            }));
        }

        self.expect(TokKind::LBrace)?;
        let mut body = Vec::new();
        loop {
            self.skip_separators();
            if matches!(self.cur.kind, TokKind::RBrace) {
                break;
            }
            body.push(self.parse_decl()?);
        }
        self.expect(TokKind::RBrace)?;
        Ok(Decl::Component(ComponentDecl {
            annotations,
            name: type_name,
            body,
            span: self.span_from(start),
        }))
    }

    /// `{ name = value ... }`
    fn parse_inits(&mut self) -> Result<Vec<PropertyInit>> {
        self.expect(TokKind::LBrace)?;
        let mut inits = Vec::new();
        loop {
            self.skip_separators();
            if matches!(self.cur.kind, TokKind::RBrace) {
                break;
            }
            let start = self.cur.span.start;
            let name = self.parse_name()?;
            self.expect(TokKind::Eq)?;
            let value = self.parse_expr_bp(0)?;
            inits.push(PropertyInit {
                name,
                value,
                span: self.span_from(start),
            });
        }
        self.expect(TokKind::RBrace)?;
        Ok(inits)
    }

    fn parse_optional_initializer(&mut self) -> Result<Option<Expr>> {
        if matches!(self.cur.kind, TokKind::Eq) {
            self.bump();
            Ok(Some(self.parse_expr_bp(0)?))
        } else {
            Ok(None)
        }
    }

    fn parse_input(&mut self, annotations: Vec<Annotation>, start: u32) -> Result<InputDecl> {
        self.expect(TokKind::KwInput)?;
        let ty = self.parse_type()?;
        let name = self.parse_ident()?;
        let default = self.parse_optional_initializer()?;
        Ok(InputDecl {
            annotations,
            ty,
            name,
            default,
            span: self.span_from(start),
        })
    }

    fn parse_output(&mut self, annotations: Vec<Annotation>, start: u32) -> Result<OutputDecl> {
        self.expect(TokKind::KwOutput)?;
        let ty = self.parse_type()?;
        let name = self.parse_ident()?;
        let value = self.parse_optional_initializer()?;
        Ok(OutputDecl {
            annotations,
            ty,
            name,
            value,
            span: self.span_from(start),
        })
    }

    fn parse_var(&mut self, annotations: Vec<Annotation>, start: u32) -> Result<VarDecl> {
        self.expect(TokKind::KwVar)?;
        // `var x = ...` has no type; anything else starts with one
        let ty = if matches!(self.cur.kind, TokKind::Ident(_)) && matches!(self.nxt.kind, TokKind::Eq)
        {
            None
        } else {
            Some(self.parse_type()?)
        };
        let name = self.parse_ident()?;
        self.expect(TokKind::Eq)?;
        let value = self.parse_expr_bp(0)?;
        Ok(VarDecl {
            annotations,
            ty,
            name,
            value,
            span: self.span_from(start),
        })
    }

    fn parse_fun(&mut self, annotations: Vec<Annotation>, start: u32) -> Result<FunDecl> {
        self.expect(TokKind::KwFun)?;
        let name = self.parse_ident()?;

        self.expect(TokKind::LParen)?;
        let mut params = Vec::new();
        if !matches!(self.cur.kind, TokKind::RParen) {
            loop {
                let param_start = self.cur.span.start;
                let ty = self.parse_type()?;
                let param_name = self.parse_ident()?;
                params.push(Param {
                    ty,
                    name: param_name,
                    span: self.span_from(param_start),
                });
                if matches!(self.cur.kind, TokKind::Comma) {
                    self.bump();
                    continue;
                }
                break;
            }
        }
        self.expect(TokKind::RParen)?;

        let ret = if matches!(self.cur.kind, TokKind::LBrace) {
            None
        } else {
            Some(self.parse_type()?)
        };

        self.expect(TokKind::LBrace)?;
        let body = self.parse_expr_bp(0)?;
        self.skip_separators();
        self.expect(TokKind::RBrace)?;

        Ok(FunDecl {
            annotations,
            name,
            params,
            ret,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_alias(&mut self, annotations: Vec<Annotation>, start: u32) -> Result<TypeAliasDecl> {
        self.expect(TokKind::KwType)?;
        let name = self.parse_ident()?;
        self.expect(TokKind::Eq)?;
        let ty = self.parse_type()?;
        Ok(TypeAliasDecl {
            annotations,
            name,
            ty,
            span: self.span_from(start),
        })
    }

    // ======= types =======

    fn parse_type(&mut self) -> Result<TypeExpr> {
        let start = self.cur.span.start;
        let first = self.parse_postfix_type()?;
        if !matches!(self.cur.kind, TokKind::Pipe) {
            return Ok(first);
        }
        let mut variants = vec![first];
        while matches!(self.cur.kind, TokKind::Pipe) {
            self.bump();
            variants.push(self.parse_postfix_type()?);
        }
        Ok(TypeExpr::Union {
            variants,
            span: self.span_from(start),
        })
    }

    fn parse_postfix_type(&mut self) -> Result<TypeExpr> {
        let start = self.cur.span.start;
        let mut ty = if matches!(self.cur.kind, TokKind::LParen) {
            self.bump();
            let inner = self.parse_type()?;
            self.expect(TokKind::RParen)?;
            inner
        } else {
            TypeExpr::Named(self.parse_ident()?)
        };
        while matches!(self.cur.kind, TokKind::LBracket) && matches!(self.nxt.kind, TokKind::RBracket)
        {
            self.bump();
            self.bump();
            ty = TypeExpr::Array {
                elem: Box::new(ty),
                span: self.span_from(start),
            };
        }
        Ok(ty)
    }

    // ======= expressions (Pratt parser) =======
    //
    // Precedence (low -> high):
    //   1:  ||
    //   3:  &&
    //   5:  == !=
    //   7:  < <= > >=
    //   10: + -
    //   20: * /
    // prefix (unary) binds tighter than all infix; we give it rbp = 100
    // member access and calls bind tightest

    fn parse_expr_bp(&mut self, min_bp: u8) -> Result<Expr> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            bail!("expression nesting exceeds limit of {}", MAX_NESTING_DEPTH);
        }
        let result = self.parse_expr_inner(min_bp);
        self.depth -= 1;
        result
    }

    fn parse_expr_inner(&mut self, min_bp: u8) -> Result<Expr> {
        let mut lhs = self.parse_prefix()?;

        loop {
            let (op, lbp, rbp) = match self.cur.kind {
                // logical
                TokKind::OrOr => (BinOp::Or, 1, 2),
                TokKind::AndAnd => (BinOp::And, 3, 4),
                // equality
                TokKind::EqEq => (BinOp::Eq, 5, 6),
                TokKind::BangEq => (BinOp::Ne, 5, 6),
                // relational
                TokKind::Lt => (BinOp::Lt, 7, 8),
                TokKind::Le => (BinOp::Le, 7, 8),
                TokKind::Gt => (BinOp::Gt, 7, 8),
                TokKind::Ge => (BinOp::Ge, 7, 8),
                // arithmetic
                TokKind::Plus => (BinOp::Add, 10, 11),
                TokKind::Minus => (BinOp::Sub, 10, 11),
                TokKind::Star => (BinOp::Mul, 20, 21),
                TokKind::Slash => (BinOp::Div, 20, 21),
                TokKind::Dot => {
                    self.bump();
                    let field = self.parse_name()?;
                    let span = lhs.span().to(field.span);
                    lhs = Expr::Member {
                        object: Box::new(lhs),
                        field,
                        span,
                    };
                    continue;
                }
                TokKind::LParen => {
                    let start = lhs.span().start;
                    let args = self.parse_call_args()?;
                    lhs = Expr::Call {
                        callee: Box::new(lhs),
                        args,
                        span: self.span_from(start),
                    };
                    continue;
                }
                _ => break,
            };

            if lbp < min_bp {
                break;
            }
            self.bump(); // consume operator
            let rhs = self.parse_expr_bp(rbp)?;
            let span = lhs.span().to(rhs.span());
            lhs = Expr::Binary {
                lhs: Box::new(lhs),
                op,
                rhs: Box::new(rhs),
                span,
            };
        }

        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<Expr> {
        // Snapshot current token to avoid borrow issues when bumping
        let tok_kind = self.cur.kind.clone();
        let tok_span = self.cur.span;

        match tok_kind {
            TokKind::Bang | TokKind::Minus => {
                self.bump();
                let op = if matches!(tok_kind, TokKind::Bang) {
                    UnOp::Not
                } else {
                    UnOp::Neg
                };
                let inner = self.parse_expr_bp(100)?;
                let span = tok_span.to(inner.span());
                Ok(Expr::Unary {
                    op,
                    expr: Box::new(inner),
                    span,
                })
            }

            // primaries
            TokKind::Int(v) => {
                self.bump();
                Ok(Expr::Lit(Lit::Int(v), tok_span))
            }
            TokKind::Float(v) => {
                self.bump();
                Ok(Expr::Lit(Lit::Float(v), tok_span))
            }
            TokKind::Str(s) => {
                self.bump();
                Ok(Expr::Lit(Lit::Str(s), tok_span))
            }
            TokKind::KwTrue => {
                self.bump();
                Ok(Expr::Lit(Lit::Bool(true), tok_span))
            }
            TokKind::KwFalse => {
                self.bump();
                Ok(Expr::Lit(Lit::Bool(false), tok_span))
            }
            TokKind::KwNull => {
                self.bump();
                Ok(Expr::Lit(Lit::Null, tok_span))
            }

            TokKind::Ident(_) => Ok(Expr::Var(self.parse_ident()?)),

            TokKind::LParen => {
                self.bump(); // '('
                let inner = self.parse_expr_bp(0)?;
                let end_tok = self.expect(TokKind::RParen)?;
                Ok(Expr::Paren {
                    inner: Box::new(inner),
                    span: Span {
                        start: tok_span.start,
                        end: end_tok.span.end,
                    },
                })
            }

            TokKind::LBracket => {
                self.bump(); // '['
                let mut items = Vec::new();
                loop {
                    self.skip_separators();
                    if matches!(self.cur.kind, TokKind::RBracket) {
                        break;
                    }
                    items.push(self.parse_expr_bp(0)?);
                }
                self.expect(TokKind::RBracket)?;
                Ok(Expr::Array {
                    items,
                    span: self.span_from(tok_span.start),
                })
            }

            TokKind::LBrace => {
                self.bump(); // '{'
                let mut fields = Vec::new();
                loop {
                    self.skip_separators();
                    if matches!(self.cur.kind, TokKind::RBrace) {
                        break;
                    }
                    let start = self.cur.span.start;
                    let key = self.parse_name()?;
                    self.expect(TokKind::Colon)?;
                    let value = self.parse_expr_bp(0)?;
                    fields.push(ObjectField {
                        key,
                        value,
                        span: self.span_from(start),
                    });
                }
                self.expect(TokKind::RBrace)?;
                Ok(Expr::Object {
                    fields,
                    span: self.span_from(tok_span.start),
                })
            }

            TokKind::Error(msg) => bail!("{} at offset {}", msg, tok_span.start),

            _ => bail!("unexpected token in expression: {:?}", tok_kind),
        }
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>> {
        self.expect(TokKind::LParen)?; // we are at '('
        let mut args = Vec::new();
        if !matches!(self.cur.kind, TokKind::RParen) {
            loop {
                args.push(self.parse_expr_bp(0)?);
                if matches!(self.cur.kind, TokKind::Comma) {
                    self.bump();
                    continue;
                }
                break;
            }
        }
        self.expect(TokKind::RParen)?;
        Ok(args)
    }
}

fn keyword_text(kind: &TokKind) -> Option<&'static str> {
    Some(match kind {
        TokKind::KwSchema => "schema",
        TokKind::KwResource => "resource",
        TokKind::KwComponent => "component",
        TokKind::KwInput => "input",
        TokKind::KwOutput => "output",
        TokKind::KwVar => "var",
        TokKind::KwFun => "fun",
        TokKind::KwType => "type",
        _ => return None,
    })
}
