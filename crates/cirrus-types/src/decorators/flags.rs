//! Argument-less decorators: `@nonEmpty`, `@unique`, `@sensitive`.

use super::{ArgShape, Decorator, DecoratorSpec, Restriction, Target, TypeClass};
use crate::value::Value;
use cirrus_ast::ast::AnnotationArgs;

static NON_EMPTY: DecoratorSpec = DecoratorSpec {
    name: "nonEmpty",
    shape: ArgShape::Bare {
        empty_parens: false,
    },
    targets: &[Target::Input],
    restriction: Restriction::OneOf(&[TypeClass::String, TypeClass::Array]),
    instances_only: false,
    deferred: true,
};

// `@unique()` is the only zero-argument form that accepts empty parentheses.
static UNIQUE: DecoratorSpec = DecoratorSpec {
    name: "unique",
    shape: ArgShape::Bare { empty_parens: true },
    targets: &[Target::Input, Target::Output],
    restriction: Restriction::OneOf(&[TypeClass::Array]),
    instances_only: false,
    deferred: true,
};

static SENSITIVE: DecoratorSpec = DecoratorSpec {
    name: "sensitive",
    shape: ArgShape::Bare {
        empty_parens: false,
    },
    targets: &[Target::Input, Target::Output],
    restriction: Restriction::Unrestricted,
    instances_only: false,
    deferred: false,
};

/// Strings must not be blank, arrays must not be empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonEmpty;

impl Decorator for NonEmpty {
    fn spec(&self) -> &DecoratorSpec {
        &NON_EMPTY
    }

    fn validate_value(&self, _args: &AnnotationArgs, value: &Value) -> Result<(), String> {
        match value {
            Value::String(s) if s.trim().is_empty() => Err("value must not be blank".to_string()),
            Value::Array(items) if items.is_empty() => {
                Err("array must not be empty".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// No two elements may be deeply equal.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unique;

impl Decorator for Unique {
    fn spec(&self) -> &DecoratorSpec {
        &UNIQUE
    }

    fn validate_value(&self, _args: &AnnotationArgs, value: &Value) -> Result<(), String> {
        let Value::Array(items) = value else {
            return Ok(());
        };
        // Value has no Hash (floats, unordered objects); quadratic is fine here.
        for (j, item) in items.iter().enumerate() {
            if let Some(i) = items[..j].iter().position(|prev| prev == item) {
                return Err(format!(
                    "duplicate element {} at index {} (first seen at index {})",
                    item, j, i
                ));
            }
        }
        Ok(())
    }
}

/// Marks a value for redaction; nothing to check.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sensitive;

impl Decorator for Sensitive {
    fn spec(&self) -> &DecoratorSpec {
        &SENSITIVE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn env(name: &str) -> Value {
        let mut map = IndexMap::new();
        map.insert("env".to_string(), Value::from(name));
        Value::Object(map)
    }

    #[test]
    fn unique_uses_deep_equality() {
        let dup = Value::Array(vec![env("prod"), env("prod")]);
        assert_eq!(
            Unique.validate_value(&AnnotationArgs::Bare, &dup),
            Err("duplicate element { env: \"prod\" } at index 1 (first seen at index 0)".to_string())
        );
        let distinct = Value::Array(vec![env("prod"), env("dev")]);
        assert!(Unique.validate_value(&AnnotationArgs::Bare, &distinct).is_ok());
    }

    #[test]
    fn non_empty_rejects_blank_and_empty() {
        assert!(NonEmpty
            .validate_value(&AnnotationArgs::Bare, &Value::from("  "))
            .is_err());
        assert!(NonEmpty
            .validate_value(&AnnotationArgs::Bare, &Value::Array(vec![]))
            .is_err());
        assert!(NonEmpty
            .validate_value(&AnnotationArgs::Bare, &Value::from("x"))
            .is_ok());
    }
}
