//! `@count(n)`: number of copies to materialise.

use super::{
    check_shape, int_arg, ArgForm, ArgShape, Decorator, DecoratorSpec, LitKind, Restriction,
    Target,
};
use crate::error::CheckError;
use cirrus_ast::ast::Annotation;

const LIMIT: i64 = 1000;

static SPEC: DecoratorSpec = DecoratorSpec {
    name: "count",
    shape: ArgShape::Forms(&[ArgForm::Literal(&[LitKind::Integer])]),
    targets: &[Target::Resource, Target::Component],
    restriction: Restriction::Unrestricted,
    instances_only: false,
    deferred: false,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct Count;

impl Decorator for Count {
    fn spec(&self) -> &DecoratorSpec {
        &SPEC
    }

    fn shape_check(&self, ann: &Annotation) -> Result<(), CheckError> {
        check_shape(&SPEC, ann)?;
        match int_arg(&ann.args) {
            Some(n) if !(0..LIMIT).contains(&n) => Err(CheckError::type_error(
                format!(
                    "@count argument {} is out of range (expected 0 to {})",
                    n,
                    LIMIT - 1
                ),
                ann.span,
            )),
            _ => Ok(()),
        }
    }
}
