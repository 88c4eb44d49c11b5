//! `@dependsOn(ref)` / `@dependsOn([ref, ...])`: explicit evaluation-order edges.

use super::{
    check_shape, check_target, positional, ArgForm, ArgShape, Decorator, DecoratorSpec,
    DependencyRef, Restriction, Site, Target,
};
use crate::error::CheckError;
use cirrus_ast::ast::{Annotation, Expr};

static SPEC: DecoratorSpec = DecoratorSpec {
    name: "dependsOn",
    shape: ArgShape::Forms(&[ArgForm::Reference, ArgForm::ReferenceArray]),
    targets: &[Target::Resource, Target::Component],
    restriction: Restriction::Unrestricted,
    instances_only: true,
    deferred: false,
};

fn references(expr: &Expr) -> Vec<&Expr> {
    match expr {
        Expr::Array { items, .. } => items.iter().collect(),
        other => vec![other],
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DependsOn;

impl Decorator for DependsOn {
    fn spec(&self) -> &DecoratorSpec {
        &SPEC
    }

    fn shape_check(&self, ann: &Annotation) -> Result<(), CheckError> {
        check_shape(&SPEC, ann)?;
        let Some(expr) = positional(&ann.args) else {
            return Ok(());
        };
        let refs = references(expr);
        if refs.is_empty() {
            return Err(CheckError::type_error(
                "@dependsOn requires at least one reference",
                ann.span,
            ));
        }
        for r in refs {
            let depth = r.as_path().map_or(0, |p| p.len());
            if depth > 2 {
                return Err(CheckError::type_error(
                    format!(
                        "@dependsOn reference {} must be a name or kind.name",
                        super::describe_expr(r).trim_start_matches("reference ")
                    ),
                    r.span(),
                ));
            }
        }
        Ok(())
    }

    /// Collects the referenced paths for the linking pass; resolution happens
    /// once every name in the unit is registered.
    fn target_check(
        &self,
        ann: &Annotation,
        site: &Site<'_>,
        refs: &mut Vec<DependencyRef>,
    ) -> Result<(), CheckError> {
        check_target(&SPEC, ann, site)?;
        if let Some(expr) = positional(&ann.args) {
            for r in references(expr) {
                if let Some(path) = r.as_path() {
                    refs.push(DependencyRef {
                        path: path.into_iter().cloned().collect(),
                        span: r.span(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cirrus_ast::ast::{AnnotationArgs, Ident};
    use cirrus_ast::span::Span;

    fn ident(text: &str) -> Ident {
        Ident {
            text: text.into(),
            span: Span::default(),
        }
    }

    fn member(object: &str, field: &str) -> Expr {
        Expr::Member {
            object: Box::new(Expr::Var(ident(object))),
            field: ident(field),
            span: Span::default(),
        }
    }

    fn ann(value: Expr) -> Annotation {
        Annotation {
            name: ident("dependsOn"),
            args: AnnotationArgs::Value(value),
            span: Span::default(),
        }
    }

    fn site(definition: bool) -> Site<'static> {
        Site {
            target: Target::Component,
            name: "web",
            definition,
            span: Span::default(),
        }
    }

    #[test]
    fn collects_every_reference() {
        let a = ann(Expr::Array {
            items: vec![member("vm", "first"), Expr::Var(ident("third"))],
            span: Span::default(),
        });
        let mut refs = Vec::new();
        DependsOn.target_check(&a, &site(false), &mut refs).unwrap();
        let shown: Vec<String> = refs.iter().map(|r| r.to_string()).collect();
        assert_eq!(shown, vec!["vm.first", "third"]);
    }

    #[test]
    fn literals_are_rejected() {
        let a = ann(Expr::Lit(cirrus_ast::ast::Lit::Str("vm".into()), Span::default()));
        let err = DependsOn.shape_check(&a).unwrap_err();
        assert_eq!(
            err.to_string(),
            "@dependsOn expects a reference or an array of references, found string \"vm\""
        );
    }

    #[test]
    fn component_definition_is_rejected() {
        let a = ann(member("vm", "first"));
        let err = DependsOn
            .target_check(&a, &site(true), &mut Vec::new())
            .unwrap_err();
        assert!(err.is_type_error());
        assert!(err.to_string().contains("definition of component 'web'"));
    }
}
