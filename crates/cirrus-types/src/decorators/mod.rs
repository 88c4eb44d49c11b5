//! Decorator (annotation) validation framework.
//!
//! Every decorator is a small immutable value described by a [`DecoratorSpec`]:
//! the argument shapes it accepts, the declaration kinds it may decorate, and
//! the value types the decorated declaration must resolve to. Checking runs in
//! three stages, each of which can stop the pipeline for that declaration:
//!
//! 1. `shape_check`: argument count/kind and literal types, no symbols needed
//! 2. `target_check`: the decorated node kind is allowed
//! 3. `type_check`: the resolved type satisfies the value-type restriction
//!
//! Value-dependent checks (`validate_value`) are deferred to evaluation time.

mod allowed;
mod bounds;
mod count;
mod depends_on;
mod description;
pub mod existing;
mod flags;
pub mod tags;
mod validate;

pub use allowed::Allowed;
pub use bounds::{LengthBound, ValueBound};
pub use count::Count;
pub use depends_on::DependsOn;
pub use description::Description;
pub use existing::{Existing, ImportRef};
pub use flags::{NonEmpty, Sensitive, Unique};
pub use tags::{Provider, Tags};
pub use validate::{Validate, PRESETS};

use crate::error::CheckError;
use crate::types::{Type, ValueType};
use crate::value::Value;
use cirrus_ast::ast::{Annotation, AnnotationArgs, Expr, Ident, Lit, UnOp};
use cirrus_ast::span::Span;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Syntactic declaration kinds a decorator may attach to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Target {
    Resource,
    Component,
    Input,
    Output,
    Var,
    Schema,
    SchemaProperty,
    Fun,
}

impl Target {
    pub fn describe(self) -> &'static str {
        match self {
            Target::Resource => "resource",
            Target::Component => "component",
            Target::Input => "input",
            Target::Output => "output",
            Target::Var => "var",
            Target::Schema => "schema",
            Target::SchemaProperty => "schema property",
            Target::Fun => "fun",
        }
    }
}

pub const ALL_TARGETS: &[Target] = &[
    Target::Resource,
    Target::Component,
    Target::Input,
    Target::Output,
    Target::Var,
    Target::Schema,
    Target::SchemaProperty,
    Target::Fun,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LitKind {
    Integer,
    Number,
    String,
    Boolean,
    Null,
}

impl LitKind {
    fn matches(self, lit: &Lit) -> bool {
        matches!(
            (self, lit),
            (LitKind::Integer, Lit::Int(_))
                | (LitKind::Number, Lit::Int(_) | Lit::Float(_))
                | (LitKind::String, Lit::Str(_))
                | (LitKind::Boolean, Lit::Bool(_))
                | (LitKind::Null, Lit::Null)
        )
    }

    fn describe(self) -> &'static str {
        match self {
            LitKind::Integer => "integer",
            LitKind::Number => "number",
            LitKind::String => "string",
            LitKind::Boolean => "boolean",
            LitKind::Null => "null",
        }
    }
}

/// One accepted form of a positional argument.
#[derive(Debug, Clone, Copy)]
pub enum ArgForm {
    Literal(&'static [LitKind]),
    LiteralArray(&'static [LitKind]),
    /// `{ key: "value" }` with string values only
    StringMap,
    /// `name` or `schema.name`
    Reference,
    ReferenceArray,
}

impl ArgForm {
    fn matches(&self, expr: &Expr) -> bool {
        match self {
            ArgForm::Literal(kinds) => {
                literal_of(expr).is_some_and(|lit| kinds.iter().any(|k| k.matches(&lit)))
            }
            ArgForm::LiteralArray(kinds) => match expr {
                Expr::Array { items, .. } => items.iter().all(|item| {
                    literal_of(item).is_some_and(|lit| kinds.iter().any(|k| k.matches(&lit)))
                }),
                _ => false,
            },
            ArgForm::StringMap => match expr {
                Expr::Object { fields, .. } => fields
                    .iter()
                    .all(|f| matches!(literal_of(&f.value), Some(Lit::Str(_)))),
                _ => false,
            },
            ArgForm::Reference => expr.as_path().is_some(),
            ArgForm::ReferenceArray => match expr {
                Expr::Array { items, .. } => items.iter().all(|i| i.as_path().is_some()),
                _ => false,
            },
        }
    }

    fn describe(&self) -> String {
        match self {
            ArgForm::Literal(kinds) => with_article(&join_kinds(kinds)),
            ArgForm::LiteralArray(kinds) => format!("an array of {} values", join_kinds(kinds)),
            ArgForm::StringMap => "an object of string values".to_string(),
            ArgForm::Reference => "a reference".to_string(),
            ArgForm::ReferenceArray => "an array of references".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NamedParam {
    pub name: &'static str,
    pub kinds: &'static [LitKind],
    pub required: bool,
}

/// Accepted argument shapes.
#[derive(Debug, Clone, Copy)]
pub enum ArgShape {
    /// No arguments. `empty_parens` additionally admits `@name()`.
    Bare { empty_parens: bool },
    /// Exactly one positional argument in one of the given forms.
    Forms(&'static [ArgForm]),
    /// `key = literal` pairs.
    Named(&'static [NamedParam]),
}

/// Semantic type classes used by value-type restrictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeClass {
    String,
    Number,
    Boolean,
    Object,
    /// Array with any element type
    Array,
    ArrayOf(ValueType),
}

impl TypeClass {
    fn admits(self, ty: &Type) -> bool {
        match (self, ty) {
            (TypeClass::String, t) => *t == Type::string(),
            (TypeClass::Number, t) => *t == Type::number(),
            (TypeClass::Boolean, t) => *t == Type::boolean(),
            (TypeClass::Object, Type::Object(_)) => true,
            (TypeClass::Array, Type::Array(_)) => true,
            (TypeClass::ArrayOf(v), Type::Array(elem)) => **elem == Type::Value(v),
            _ => false,
        }
    }

    fn describe(self) -> String {
        match self {
            TypeClass::String => "string".to_string(),
            TypeClass::Number => "number".to_string(),
            TypeClass::Boolean => "boolean".to_string(),
            TypeClass::Object => "object".to_string(),
            TypeClass::Array => "array".to_string(),
            TypeClass::ArrayOf(v) => format!("{}[]", v.keyword()),
        }
    }
}

/// Which resolved types a decorated declaration may have.
#[derive(Debug, Clone, Copy)]
pub enum Restriction {
    Unrestricted,
    OneOf(&'static [TypeClass]),
}

impl Restriction {
    /// Unions qualify only when every variant does; `any` never qualifies.
    pub fn admits(&self, ty: &Type) -> bool {
        match self {
            Restriction::Unrestricted => true,
            Restriction::OneOf(classes) => match ty {
                Type::Union(variants) => variants.iter().all(|v| self.admits(v)),
                t => classes.iter().any(|c| c.admits(t)),
            },
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DecoratorSpec {
    pub name: &'static str,
    pub shape: ArgShape,
    pub targets: &'static [Target],
    pub restriction: Restriction,
    /// Rejected on component definitions; only instances qualify.
    pub instances_only: bool,
    /// Must be re-run at evaluation time against concrete values.
    pub deferred: bool,
}

/// The declaration a decorator is attached to.
#[derive(Debug, Clone, Copy)]
pub struct Site<'a> {
    pub target: Target,
    pub name: &'a str,
    /// Set for a component definition (as opposed to an instance).
    pub definition: bool,
    pub span: Span,
}

/// A `@dependsOn` argument collected during the target check.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyRef {
    pub path: Vec<Ident>,
    pub span: Span,
}

impl fmt::Display for DependencyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = self.path.iter().map(|i| i.text.as_str()).collect();
        write!(f, "{}", parts.join("."))
    }
}

/// Contract every decorator implements. The default stages are driven by the
/// [`DecoratorSpec`]; implementors override a stage only to add constraints.
pub trait Decorator: fmt::Debug + Send + Sync {
    fn spec(&self) -> &DecoratorSpec;

    fn name(&self) -> &'static str {
        self.spec().name
    }

    fn shape_check(&self, ann: &Annotation) -> Result<(), CheckError> {
        check_shape(self.spec(), ann)
    }

    fn target_check(
        &self,
        ann: &Annotation,
        site: &Site<'_>,
        _refs: &mut Vec<DependencyRef>,
    ) -> Result<(), CheckError> {
        check_target(self.spec(), ann, site)
    }

    fn type_check(&self, ann: &Annotation, site: &Site<'_>, resolved: &Type) -> Result<(), CheckError> {
        check_restriction(self.spec(), ann, site, resolved)
    }

    /// Evaluation-time check against a concrete value.
    fn validate_value(&self, _args: &AnnotationArgs, _value: &Value) -> Result<(), String> {
        Ok(())
    }
}

pub fn check_shape(spec: &DecoratorSpec, ann: &Annotation) -> Result<(), CheckError> {
    let name = spec.name;
    match (&spec.shape, &ann.args) {
        (ArgShape::Bare { .. }, AnnotationArgs::Bare) => Ok(()),
        (ArgShape::Bare { empty_parens: true }, AnnotationArgs::Empty) => Ok(()),
        (ArgShape::Bare { .. }, _) => Err(CheckError::type_error(
            format!("@{} does not take arguments", name),
            ann.span,
        )),

        (ArgShape::Forms(forms), args) => {
            let expected = forms
                .iter()
                .map(ArgForm::describe)
                .collect::<Vec<_>>()
                .join(" or ");
            let found = match args {
                AnnotationArgs::Value(expr) if forms.iter().any(|f| f.matches(expr)) => {
                    return Ok(())
                }
                AnnotationArgs::Value(expr) => describe_expr(expr),
                AnnotationArgs::Named(_) => "named arguments".to_string(),
                AnnotationArgs::Bare | AnnotationArgs::Empty => "no argument".to_string(),
            };
            Err(CheckError::type_error(
                format!("@{} expects {}, found {}", name, expected, found),
                ann.span,
            ))
        }

        (ArgShape::Named(params), AnnotationArgs::Named(args)) => {
            let mut seen: Vec<&str> = Vec::new();
            for arg in args {
                let key = arg.name.text.as_str();
                let Some(param) = params.iter().find(|p| p.name == key) else {
                    return Err(CheckError::type_error(
                        format!("@{} has no argument named '{}'", name, key),
                        arg.span,
                    ));
                };
                if seen.contains(&key) {
                    return Err(CheckError::type_error(
                        format!("@{} argument '{}' is given more than once", name, key),
                        arg.span,
                    ));
                }
                seen.push(key);
                let ok = literal_of(&arg.value)
                    .is_some_and(|lit| param.kinds.iter().any(|k| k.matches(&lit)));
                if !ok {
                    return Err(CheckError::type_error(
                        format!(
                            "@{} argument '{}' must be {}, found {}",
                            name,
                            key,
                            with_article(&join_kinds(param.kinds)),
                            describe_expr(&arg.value)
                        ),
                        arg.span,
                    ));
                }
            }
            if let Some(missing) = params
                .iter()
                .find(|p| p.required && !seen.contains(&p.name))
            {
                return Err(CheckError::type_error(
                    format!("@{} requires argument '{}'", name, missing.name),
                    ann.span,
                ));
            }
            Ok(())
        }
        (ArgShape::Named(params), _) => {
            let names: Vec<&str> = params.iter().map(|p| p.name).collect();
            Err(CheckError::type_error(
                format!(
                    "@{} expects named arguments ({})",
                    name,
                    names.join(", ")
                ),
                ann.span,
            ))
        }
    }
}

pub fn check_target(spec: &DecoratorSpec, ann: &Annotation, site: &Site<'_>) -> Result<(), CheckError> {
    if !spec.targets.contains(&site.target) {
        let allowed: Vec<&str> = spec.targets.iter().map(|t| t.describe()).collect();
        return Err(CheckError::type_error(
            format!(
                "@{} cannot be applied to {} '{}' (allowed on: {})",
                spec.name,
                with_article(site.target.describe()),
                site.name,
                allowed.join(", ")
            ),
            ann.span,
        ));
    }
    if spec.instances_only && site.definition {
        return Err(CheckError::type_error(
            format!(
                "@{} cannot be applied to the definition of component '{}'; decorate a component instance instead",
                spec.name, site.name
            ),
            ann.span,
        ));
    }
    Ok(())
}

pub fn check_restriction(
    spec: &DecoratorSpec,
    ann: &Annotation,
    site: &Site<'_>,
    resolved: &Type,
) -> Result<(), CheckError> {
    let Restriction::OneOf(classes) = spec.restriction else {
        return Ok(());
    };
    if spec.restriction.admits(resolved) {
        return Ok(());
    }
    let expected: Vec<String> = classes.iter().map(|c| c.describe()).collect();
    Err(CheckError::type_error(
        format!(
            "@{} cannot be applied to '{}' of type {} (expected {})",
            spec.name,
            site.name,
            resolved,
            expected.join(", ")
        ),
        ann.span,
    ))
}

/// The literal an argument expression denotes, folding a leading minus.
pub fn literal_of(expr: &Expr) -> Option<Lit> {
    match expr {
        Expr::Lit(lit, _) => Some(lit.clone()),
        Expr::Paren { inner, .. } => literal_of(inner),
        Expr::Unary {
            op: UnOp::Neg,
            expr,
            ..
        } => match literal_of(expr)? {
            Lit::Int(n) => Some(Lit::Int(-n)),
            Lit::Float(x) => Some(Lit::Float(-x)),
            _ => None,
        },
        _ => None,
    }
}

/// Short human description of an argument for diagnostics.
pub fn describe_expr(expr: &Expr) -> String {
    if let Some(lit) = literal_of(expr) {
        return match lit {
            Lit::Int(n) => format!("integer {}", n),
            Lit::Float(x) => format!("number {}", x),
            Lit::Str(s) => format!("string \"{}\"", s),
            Lit::Bool(b) => format!("boolean {}", b),
            Lit::Null => "null".to_string(),
        };
    }
    if let Some(path) = expr.as_path() {
        let parts: Vec<&str> = path.iter().map(|i| i.text.as_str()).collect();
        return format!("reference {}", parts.join("."));
    }
    match expr {
        Expr::Array { .. } => "array".to_string(),
        Expr::Object { .. } => "object".to_string(),
        _ => "expression".to_string(),
    }
}

/// The single positional argument, if any.
pub fn positional(args: &AnnotationArgs) -> Option<&Expr> {
    match args {
        AnnotationArgs::Value(expr) => Some(expr),
        _ => None,
    }
}

/// A named argument's literal string value.
pub fn named_str<'a>(args: &'a AnnotationArgs, key: &str) -> Option<&'a str> {
    let AnnotationArgs::Named(named) = args else {
        return None;
    };
    named
        .iter()
        .find(|a| a.name.text == key)
        .and_then(|a| str_of(&a.value))
}

/// A string literal, looking through parentheses the way [`literal_of`] does.
pub fn str_of(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Lit(Lit::Str(s), _) => Some(s.as_str()),
        Expr::Paren { inner, .. } => str_of(inner),
        _ => None,
    }
}

pub fn int_arg(args: &AnnotationArgs) -> Option<i64> {
    match literal_of(positional(args)?)? {
        Lit::Int(n) => Some(n),
        _ => None,
    }
}

fn join_kinds(kinds: &[LitKind]) -> String {
    let names: Vec<&str> = kinds.iter().map(|k| k.describe()).collect();
    match names.split_last() {
        Some((last, rest)) if !rest.is_empty() => format!("{} or {}", rest.join(", "), last),
        _ => names.join(""),
    }
}

fn with_article(noun: &str) -> String {
    match noun.chars().next() {
        Some('a' | 'e' | 'i' | 'o' | 'u') => format!("an {}", noun),
        _ => format!("a {}", noun),
    }
}

/// Name -> decorator table.
#[derive(Debug, Clone)]
pub struct DecoratorRegistry {
    decorators: IndexMap<&'static str, Arc<dyn Decorator>>,
}

impl Default for DecoratorRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl DecoratorRegistry {
    pub fn empty() -> Self {
        Self {
            decorators: IndexMap::new(),
        }
    }

    /// Registry holding every built-in decorator.
    pub fn builtin() -> Self {
        let builtins: Vec<Arc<dyn Decorator>> = vec![
            Arc::new(Allowed),
            Arc::new(ValueBound::min()),
            Arc::new(ValueBound::max()),
            Arc::new(LengthBound::min()),
            Arc::new(LengthBound::max()),
            Arc::new(NonEmpty),
            Arc::new(Unique),
            Arc::new(Sensitive),
            Arc::new(Tags),
            Arc::new(Provider),
            Arc::new(Existing),
            Arc::new(Validate),
            Arc::new(DependsOn),
            Arc::new(Count),
            Arc::new(Description),
        ];
        Self {
            decorators: builtins.into_iter().map(|d| (d.name(), d)).collect(),
        }
    }

    /// Register a decorator. Fails if the name is taken.
    pub fn register(&mut self, decorator: impl Decorator + 'static) -> Result<(), String> {
        self.register_arc(Arc::new(decorator))
    }

    fn register_arc(&mut self, decorator: Arc<dyn Decorator>) -> Result<(), String> {
        let name = decorator.name();
        if self.decorators.contains_key(name) {
            return Err(format!("decorator @{} is already registered", name));
        }
        self.decorators.insert(name, decorator);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Decorator>> {
        self.decorators.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.decorators.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.decorators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decorators.is_empty()
    }
}
