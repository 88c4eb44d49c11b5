//! `@description("...")`: free-form documentation on any declaration.

use super::{ArgForm, ArgShape, Decorator, DecoratorSpec, LitKind, Restriction, ALL_TARGETS};

static SPEC: DecoratorSpec = DecoratorSpec {
    name: "description",
    shape: ArgShape::Forms(&[ArgForm::Literal(&[LitKind::String])]),
    targets: ALL_TARGETS,
    restriction: Restriction::Unrestricted,
    instances_only: false,
    deferred: false,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct Description;

impl Decorator for Description {
    fn spec(&self) -> &DecoratorSpec {
        &SPEC
    }
}
