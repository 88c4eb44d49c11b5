//! Literal values for evaluation-time decorator checks.
//!
//! This is not the interpreter's value model, only enough of one to express
//! literal defaults and the arguments of decorators.

use cirrus_ast::ast::{Expr, Lit, UnOp};
use indexmap::IndexMap;
use std::fmt;

use crate::types::Type;

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize), serde(untagged))]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
}

impl PartialEq for Value {
    /// Deep structural equality; object key order is irrelevant.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Convert a literal-only expression. Returns `None` as soon as anything
    /// needs evaluation (references, calls, operators other than unary minus).
    pub fn from_expr(expr: &Expr) -> Option<Value> {
        match expr {
            Expr::Lit(lit, _) => Some(match lit {
                Lit::Int(n) => Value::Number(*n as f64),
                Lit::Float(x) => Value::Number(*x),
                Lit::Str(s) => Value::String(s.clone()),
                Lit::Bool(b) => Value::Bool(*b),
                Lit::Null => Value::Null,
            }),
            Expr::Unary {
                op: UnOp::Neg,
                expr,
                ..
            } => match Value::from_expr(expr)? {
                Value::Number(n) => Some(Value::Number(-n)),
                _ => None,
            },
            Expr::Paren { inner, .. } => Value::from_expr(inner),
            Expr::Array { items, .. } => items
                .iter()
                .map(Value::from_expr)
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            Expr::Object { fields, .. } => fields
                .iter()
                .map(|f| Value::from_expr(&f.value).map(|v| (f.key.text.clone(), v)))
                .collect::<Option<IndexMap<_, _>>>()
                .map(Value::Object),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Whether this value can inhabit `ty`.
    pub fn conforms_to(&self, ty: &Type) -> bool {
        match (self, ty) {
            (_, Type::Union(variants)) => variants.iter().any(|v| self.conforms_to(v)),
            (_, t) if t.is_any() => true,
            (Value::Null, t) => *t == Type::null(),
            (Value::Bool(_), t) => *t == Type::boolean(),
            (Value::Number(_), t) => *t == Type::number(),
            (Value::String(_), t) => *t == Type::string(),
            (Value::Array(items), Type::Array(elem)) => items.iter().all(|i| i.conforms_to(elem)),
            (Value::Object(_), Type::Object(fields)) if fields.is_empty() => true,
            (Value::Object(map), Type::Object(fields)) => {
                map.len() == fields.len()
                    && fields
                        .iter()
                        .all(|(k, t)| map.get(k).is_some_and(|v| v.conforms_to(t)))
            }
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, v) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
            Value::Object(map) => {
                write!(f, "{{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, " {}: {}", k, v)?;
                }
                if map.is_empty() {
                    write!(f, "}}")
                } else {
                    write!(f, " }}")
                }
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}
