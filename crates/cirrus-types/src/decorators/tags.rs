//! `@tags` and `@provider` on resource and component instances.

use super::{
    check_shape, positional, str_of, ArgForm, ArgShape, Decorator, DecoratorSpec, LitKind,
    Restriction, Target,
};
use crate::error::CheckError;
use cirrus_ast::ast::{Annotation, Expr};
use indexmap::{IndexMap, IndexSet};

const STRING: &[LitKind] = &[LitKind::String];

static TAGS: DecoratorSpec = DecoratorSpec {
    name: "tags",
    shape: ArgShape::Forms(&[
        ArgForm::Literal(STRING),
        ArgForm::LiteralArray(STRING),
        ArgForm::StringMap,
    ]),
    targets: &[Target::Resource, Target::Component],
    restriction: Restriction::Unrestricted,
    instances_only: true,
    deferred: false,
};

static PROVIDER: DecoratorSpec = DecoratorSpec {
    name: "provider",
    shape: ArgShape::Forms(&[ArgForm::Literal(STRING), ArgForm::LiteralArray(STRING)]),
    targets: &[Target::Resource, Target::Component],
    restriction: Restriction::Unrestricted,
    instances_only: true,
    deferred: false,
};

/// Every string in the argument (map keys included), in source order.
fn strings(expr: &Expr) -> Vec<&str> {
    if let Some(s) = str_of(expr) {
        return vec![s];
    }
    match expr {
        Expr::Array { items, .. } => items.iter().flat_map(strings).collect(),
        Expr::Object { fields, .. } => fields
            .iter()
            .flat_map(|f| std::iter::once(f.key.text.as_str()).chain(strings(&f.value)))
            .collect(),
        _ => Vec::new(),
    }
}

fn check_labels(spec: &DecoratorSpec, ann: &Annotation) -> Result<(), CheckError> {
    check_shape(spec, ann)?;
    let Some(expr) = positional(&ann.args) else {
        return Ok(());
    };
    if matches!(expr, Expr::Array { items, .. } if items.is_empty())
        || matches!(expr, Expr::Object { fields, .. } if fields.is_empty())
    {
        return Err(CheckError::type_error(
            format!("@{} requires at least one value", spec.name),
            ann.span,
        ));
    }
    if strings(expr).iter().any(|s| s.trim().is_empty()) {
        return Err(CheckError::type_error(
            format!("@{} values must not be blank", spec.name),
            ann.span,
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Tags;

impl Decorator for Tags {
    fn spec(&self) -> &DecoratorSpec {
        &TAGS
    }

    fn shape_check(&self, ann: &Annotation) -> Result<(), CheckError> {
        check_labels(&TAGS, ann)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Provider;

impl Decorator for Provider {
    fn spec(&self) -> &DecoratorSpec {
        &PROVIDER
    }

    fn shape_check(&self, ann: &Annotation) -> Result<(), CheckError> {
        check_labels(&PROVIDER, ann)
    }
}

/// Merge every `@tags` on a declaration. Plain labels map to `None`, map
/// entries to their value; a repeated key keeps its first position and takes
/// the latest value.
pub fn collect_tags(annotations: &[Annotation]) -> IndexMap<String, Option<String>> {
    let mut out = IndexMap::new();
    for ann in annotations.iter().filter(|a| a.name.text == TAGS.name) {
        let Some(expr) = positional(&ann.args) else {
            continue;
        };
        match expr {
            Expr::Object { fields, .. } => {
                for f in fields {
                    if let Some(v) = str_of(&f.value) {
                        out.insert(f.key.text.clone(), Some(v.to_string()));
                    }
                }
            }
            other => {
                for label in strings(other) {
                    out.entry(label.to_string()).or_insert(None);
                }
            }
        }
    }
    out
}

/// Distinct `@provider` names in order of first appearance.
pub fn collect_providers(annotations: &[Annotation]) -> IndexSet<String> {
    annotations
        .iter()
        .filter(|a| a.name.text == PROVIDER.name)
        .filter_map(|a| positional(&a.args))
        .flat_map(strings)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cirrus_ast::ast::{AnnotationArgs, Ident, Lit, ObjectField};
    use cirrus_ast::span::Span;

    fn sp() -> Span {
        Span::default()
    }

    fn ident(text: &str) -> Ident {
        Ident {
            text: text.into(),
            span: sp(),
        }
    }

    fn s(text: &str) -> Expr {
        Expr::Lit(Lit::Str(text.into()), sp())
    }

    fn ann(name: &str, value: Expr) -> Annotation {
        Annotation {
            name: ident(name),
            args: AnnotationArgs::Value(value),
            span: sp(),
        }
    }

    fn array(items: Vec<Expr>) -> Expr {
        Expr::Array { items, span: sp() }
    }

    #[test]
    fn blank_labels_are_rejected() {
        let err = Tags
            .shape_check(&ann("tags", array(vec![s("web"), s(" ")])))
            .unwrap_err();
        assert_eq!(err.to_string(), "@tags values must not be blank");
    }

    #[test]
    fn provider_does_not_take_maps() {
        let map = Expr::Object {
            fields: vec![ObjectField {
                key: ident("env"),
                value: s("prod"),
                span: sp(),
            }],
            span: sp(),
        };
        assert!(Tags.shape_check(&ann("tags", map.clone())).is_ok());
        assert!(Provider.shape_check(&ann("provider", map)).is_err());
    }

    #[test]
    fn collection_dedupes() {
        let anns = vec![
            ann("provider", array(vec![s("aws"), s("gcp")])),
            ann("provider", s("aws")),
            ann("tags", array(vec![s("web"), s("web")])),
        ];
        let providers: Vec<String> = collect_providers(&anns).into_iter().collect();
        assert_eq!(providers, vec!["aws", "gcp"]);
        let tags = collect_tags(&anns);
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get("web"), Some(&None));
    }
}
