//! `@allowed(...)`: closed set of permitted values for an input.

use super::{
    check_restriction, describe_expr, positional, ArgForm, ArgShape, Decorator, DecoratorSpec,
    LitKind, Restriction, Site, Target, TypeClass,
};
use crate::error::CheckError;
use crate::types::Type;
use crate::value::Value;
use cirrus_ast::ast::{Annotation, AnnotationArgs, Expr};

const LITERALS: &[LitKind] = &[
    LitKind::Number,
    LitKind::String,
    LitKind::Boolean,
    LitKind::Null,
];

static SPEC: DecoratorSpec = DecoratorSpec {
    name: "allowed",
    shape: ArgShape::Forms(&[ArgForm::Literal(LITERALS), ArgForm::LiteralArray(LITERALS)]),
    targets: &[Target::Input],
    restriction: Restriction::OneOf(&[
        TypeClass::String,
        TypeClass::Number,
        TypeClass::Array,
        TypeClass::Object,
    ]),
    instances_only: false,
    deferred: true,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct Allowed;

/// The permitted values: a single literal, or every item of an array literal.
fn candidates(args: &AnnotationArgs) -> Option<Vec<Value>> {
    match positional(args)? {
        Expr::Array { items, .. } => items.iter().map(Value::from_expr).collect(),
        expr => Value::from_expr(expr).map(|v| vec![v]),
    }
}

fn list(values: &[Value]) -> String {
    Value::Array(values.to_vec()).to_string()
}

impl Decorator for Allowed {
    fn spec(&self) -> &DecoratorSpec {
        &SPEC
    }

    /// Unlike the declared forms suggest, object literals are accepted too so
    /// object-typed inputs can be restricted.
    fn shape_check(&self, ann: &Annotation) -> Result<(), CheckError> {
        let Some(expr) = positional(&ann.args) else {
            return super::check_shape(&SPEC, ann);
        };
        if matches!(expr, Expr::Array { items, .. } if items.is_empty()) {
            return Err(CheckError::type_error(
                "@allowed requires at least one value",
                ann.span,
            ));
        }
        if candidates(&ann.args).is_none() {
            return Err(CheckError::type_error(
                format!(
                    "@allowed expects literal values, found {}",
                    describe_expr(expr)
                ),
                ann.span,
            ));
        }
        Ok(())
    }

    fn type_check(&self, ann: &Annotation, site: &Site<'_>, resolved: &Type) -> Result<(), CheckError> {
        check_restriction(&SPEC, ann, site, resolved)?;
        let elem = resolved.element();
        for value in candidates(&ann.args).unwrap_or_default() {
            let fits = value.conforms_to(resolved) || elem.is_some_and(|e| value.conforms_to(e));
            if !fits {
                return Err(CheckError::type_error(
                    format!(
                        "@allowed value {} is not compatible with '{}' of type {}",
                        value, site.name, resolved
                    ),
                    ann.span,
                ));
            }
        }
        Ok(())
    }

    fn validate_value(&self, args: &AnnotationArgs, value: &Value) -> Result<(), String> {
        let allowed = candidates(args).unwrap_or_default();
        if allowed.contains(value) {
            return Ok(());
        }
        match value {
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if !allowed.contains(item) {
                        return Err(format!(
                            "element at index {} ({}) is not one of the allowed values {}",
                            i,
                            item,
                            list(&allowed)
                        ));
                    }
                }
                Ok(())
            }
            other => Err(format!(
                "value {} is not one of the allowed values {}",
                other,
                list(&allowed)
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cirrus_ast::ast::{Ident, Lit};
    use cirrus_ast::span::Span;

    fn s(text: &str) -> Expr {
        Expr::Lit(Lit::Str(text.to_string()), Span::default())
    }

    fn array(items: Vec<Expr>) -> AnnotationArgs {
        AnnotationArgs::Value(Expr::Array {
            items,
            span: Span::default(),
        })
    }

    fn ann(args: AnnotationArgs) -> Annotation {
        Annotation {
            name: Ident {
                text: "allowed".into(),
                span: Span::default(),
            },
            args,
            span: Span::default(),
        }
    }

    fn site() -> Site<'static> {
        Site {
            target: Target::Input,
            name: "env",
            definition: false,
            span: Span::default(),
        }
    }

    #[test]
    fn empty_list_is_rejected() {
        let err = Allowed.shape_check(&ann(array(vec![]))).unwrap_err();
        assert_eq!(err.to_string(), "@allowed requires at least one value");
    }

    #[test]
    fn candidates_must_match_declared_type() {
        let a = ann(array(vec![s("dev"), s("prod")]));
        assert!(Allowed.type_check(&a, &site(), &Type::string()).is_ok());
        assert!(Allowed
            .type_check(&a, &site(), &Type::array(Type::string()))
            .is_ok());
        let err = Allowed
            .type_check(&a, &site(), &Type::number())
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "@allowed value \"dev\" is not compatible with 'env' of type number"
        );
    }

    #[test]
    fn any_is_rejected() {
        let a = ann(array(vec![s("dev")]));
        assert!(Allowed.type_check(&a, &site(), &Type::any()).is_err());
    }

    #[test]
    fn membership_is_elementwise_for_arrays() {
        let args = array(vec![s("dev"), s("prod")]);
        assert!(Allowed.validate_value(&args, &Value::from("dev")).is_ok());
        assert!(Allowed
            .validate_value(&args, &Value::from(vec!["prod", "dev"]))
            .is_ok());
        assert_eq!(
            Allowed
                .validate_value(&args, &Value::from(vec!["dev", "qa"]))
                .unwrap_err(),
            "element at index 1 (\"qa\") is not one of the allowed values [\"dev\", \"prod\"]"
        );
        assert_eq!(
            Allowed
                .validate_value(&args, &Value::from("qa"))
                .unwrap_err(),
            "value \"qa\" is not one of the allowed values [\"dev\", \"prod\"]"
        );
    }
}
