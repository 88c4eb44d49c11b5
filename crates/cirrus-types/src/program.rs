//! The checked program handed to an evaluator.

use crate::decorators::{Decorator, ImportRef};
use crate::env::{ScopeId, TypeEnv};
use crate::error::{CheckError, Diagnostics};
use crate::types::Type;
use crate::value::Value;
use cirrus_ast::ast::AnnotationArgs;
use cirrus_ast::span::Span;
use indexmap::{IndexMap, IndexSet};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceKind {
    /// `resource <schema> <name>`
    Resource { schema: String },
    /// `component <component> <name>`
    Component { component: String },
}

/// `@existing` import of a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistingRef {
    pub reference: String,
    pub kind: ImportRef,
}

/// One resource or component instance.
#[derive(Debug, Clone)]
pub struct InstanceInfo {
    /// Qualified name (`bucket` or `app.bucket`).
    pub name: String,
    pub kind: InstanceKind,
    /// Enclosing component definition, if declared inside one.
    pub component: Option<String>,
    /// Qualified names this instance depends on, explicit and implicit.
    pub dependencies: IndexSet<String>,
    pub tags: IndexMap<String, Option<String>>,
    pub providers: IndexSet<String>,
    pub count: Option<u32>,
    pub existing: Option<ExistingRef>,
    pub span: Span,
}

/// A decorator whose check depends on a concrete value and has to run again
/// at evaluation time.
#[derive(Debug, Clone)]
pub struct DeferredCheck {
    pub(crate) decorator: Arc<dyn Decorator>,
    pub(crate) args: AnnotationArgs,
    pub(crate) target: String,
    pub(crate) default: Option<Value>,
    pub(crate) span: Span,
}

impl DeferredCheck {
    pub fn decorator(&self) -> &'static str {
        self.decorator.name()
    }

    /// Qualified name of the decorated declaration.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Literal default or value written in the source, if any.
    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn args(&self) -> &AnnotationArgs {
        &self.args
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn run(&self, value: &Value) -> Result<(), CheckError> {
        self.decorator
            .validate_value(&self.args, value)
            .map_err(|message| CheckError::Validation {
                decorator: self.decorator().to_string(),
                target: self.target.clone(),
                message,
            })
    }
}

/// Result of a successful check: types, instances, evaluation order and the
/// checks left for evaluation time.
#[derive(Debug, Clone)]
pub struct CheckedProgram {
    pub(crate) env: TypeEnv,
    pub(crate) instances: IndexMap<String, InstanceInfo>,
    pub(crate) order: Vec<String>,
    pub(crate) component_orders: IndexMap<String, Vec<String>>,
    pub(crate) component_scopes: IndexMap<String, ScopeId>,
    pub(crate) deferred: Vec<DeferredCheck>,
}

impl CheckedProgram {
    pub fn env(&self) -> &TypeEnv {
        &self.env
    }

    /// Top-level bindings in declaration order.
    pub fn globals(&self) -> impl Iterator<Item = (&str, &Type)> {
        self.env.bindings(ScopeId::GLOBAL)
    }

    /// Type of a top-level binding.
    pub fn lookup(&self, name: &str) -> Option<&Type> {
        self.globals().find(|(n, _)| *n == name).map(|(_, t)| t)
    }

    /// Bindings declared in a component body.
    pub fn component_bindings(&self, component: &str) -> Option<impl Iterator<Item = (&str, &Type)>> {
        let scope = *self.component_scopes.get(component)?;
        Some(self.env.bindings(scope))
    }

    pub fn instance(&self, name: &str) -> Option<&InstanceInfo> {
        self.instances.get(name)
    }

    pub fn instances(&self) -> impl Iterator<Item = &InstanceInfo> {
        self.instances.values()
    }

    pub fn dependencies(&self, name: &str) -> Option<&IndexSet<String>> {
        self.instances.get(name).map(|i| &i.dependencies)
    }

    /// Top-level instances, every one after its dependencies.
    pub fn evaluation_order(&self) -> &[String] {
        &self.order
    }

    pub fn component_order(&self, component: &str) -> Option<&[String]> {
        self.component_orders.get(component).map(Vec::as_slice)
    }

    pub fn component_orders(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.component_orders
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn deferred_checks(&self) -> &[DeferredCheck] {
        &self.deferred
    }

    /// Run every deferred check whose declaration carries a literal value.
    pub fn validate_defaults(&self) -> Result<(), Diagnostics> {
        let errors: Vec<CheckError> = self
            .deferred
            .iter()
            .filter_map(|check| {
                let value = check.default.as_ref()?;
                check.run(value).err()
            })
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(Diagnostics(errors))
        }
    }
}
