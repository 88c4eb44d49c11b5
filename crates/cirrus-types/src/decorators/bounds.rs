//! Numeric and length bounds: `@minValue`, `@maxValue`, `@minLength`, `@maxLength`.

use super::{
    check_shape, int_arg, ArgForm, ArgShape, Decorator, DecoratorSpec, LitKind, Restriction,
    Target, TypeClass,
};
use crate::error::CheckError;
use crate::types::ValueType;
use crate::value::Value;
use cirrus_ast::ast::{Annotation, AnnotationArgs};

const VALUE_LIMIT: i64 = 999_999;
const LENGTH_LIMIT: i64 = 9_999_999;

const INTEGER: ArgShape = ArgShape::Forms(&[ArgForm::Literal(&[LitKind::Integer])]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Min,
    Max,
}

impl Side {
    fn word(self) -> &'static str {
        match self {
            Side::Min => "minimum",
            Side::Max => "maximum",
        }
    }

    fn violated(self, actual: f64, bound: f64) -> Option<&'static str> {
        match self {
            Side::Min if actual < bound => Some("less than"),
            Side::Max if actual > bound => Some("greater than"),
            _ => None,
        }
    }
}

/// Integer argument in `[0, limit)`.
fn check_range(spec: &DecoratorSpec, ann: &Annotation, limit: i64) -> Result<(), CheckError> {
    check_shape(spec, ann)?;
    match int_arg(&ann.args) {
        Some(n) if (0..limit).contains(&n) => Ok(()),
        Some(n) => Err(CheckError::type_error(
            format!(
                "@{} argument {} is out of range (expected 0 to {})",
                spec.name,
                n,
                limit - 1
            ),
            ann.span,
        )),
        None => Ok(()),
    }
}

/// `@minValue(n)` / `@maxValue(n)` on numbers, per element for arrays.
#[derive(Debug, Clone)]
pub struct ValueBound {
    spec: DecoratorSpec,
    side: Side,
}

impl ValueBound {
    fn new(name: &'static str, side: Side) -> Self {
        Self {
            spec: DecoratorSpec {
                name,
                shape: INTEGER,
                targets: &[Target::Input, Target::Output],
                restriction: Restriction::OneOf(&[
                    TypeClass::Number,
                    TypeClass::ArrayOf(ValueType::Number),
                ]),
                instances_only: false,
                deferred: true,
            },
            side,
        }
    }

    pub fn min() -> Self {
        Self::new("minValue", Side::Min)
    }

    pub fn max() -> Self {
        Self::new("maxValue", Side::Max)
    }

    /// "is less than the minimum 10" when `n` is out of bounds.
    fn check_number(&self, n: f64, bound: f64) -> Option<String> {
        self.side.violated(n, bound).map(|rel| {
            format!("is {} the {} {}", rel, self.side.word(), Value::Number(bound))
        })
    }
}

impl Decorator for ValueBound {
    fn spec(&self) -> &DecoratorSpec {
        &self.spec
    }

    fn shape_check(&self, ann: &Annotation) -> Result<(), CheckError> {
        check_range(&self.spec, ann, VALUE_LIMIT)
    }

    fn validate_value(&self, args: &AnnotationArgs, value: &Value) -> Result<(), String> {
        let Some(bound) = int_arg(args) else {
            return Ok(());
        };
        let bound = bound as f64;
        match value {
            Value::Number(n) => match self.check_number(*n, bound) {
                Some(msg) => Err(format!("value {} {}", value, msg)),
                None => Ok(()),
            },
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    let Some(n) = item.as_number() else {
                        return Err(format!(
                            "element at index {} ({}) is not a number",
                            i, item
                        ));
                    };
                    if let Some(msg) = self.check_number(n, bound) {
                        return Err(format!("element at index {} ({}) {}", i, item, msg));
                    }
                }
                Ok(())
            }
            other => Err(format!("expected a number, found {}", other.kind())),
        }
    }
}

/// `@minLength(n)` / `@maxLength(n)` on strings (characters) and arrays (elements).
#[derive(Debug, Clone)]
pub struct LengthBound {
    spec: DecoratorSpec,
    side: Side,
}

impl LengthBound {
    fn new(name: &'static str, side: Side) -> Self {
        Self {
            spec: DecoratorSpec {
                name,
                shape: INTEGER,
                targets: &[Target::Input, Target::Output],
                restriction: Restriction::OneOf(&[TypeClass::String, TypeClass::Array]),
                instances_only: false,
                deferred: true,
            },
            side,
        }
    }

    pub fn min() -> Self {
        Self::new("minLength", Side::Min)
    }

    pub fn max() -> Self {
        Self::new("maxLength", Side::Max)
    }
}

impl Decorator for LengthBound {
    fn spec(&self) -> &DecoratorSpec {
        &self.spec
    }

    fn shape_check(&self, ann: &Annotation) -> Result<(), CheckError> {
        check_range(&self.spec, ann, LENGTH_LIMIT)
    }

    fn validate_value(&self, args: &AnnotationArgs, value: &Value) -> Result<(), String> {
        let Some(bound) = int_arg(args) else {
            return Ok(());
        };
        let len = match value {
            Value::String(s) => s.chars().count(),
            Value::Array(items) => items.len(),
            other => {
                return Err(format!(
                    "expected a string or array, found {}",
                    other.kind()
                ))
            }
        };
        match self.side.violated(len as f64, bound as f64) {
            Some(rel) => Err(format!(
                "length {} is {} the {} length {}",
                len,
                rel,
                self.side.word(),
                bound
            )),
            None => Ok(()),
        }
    }
}
