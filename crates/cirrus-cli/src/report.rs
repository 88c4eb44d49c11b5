//! Serializable summary of a check, for `--format json` and the pretty printer.

use cirrus_ast::span::Span;
use cirrus_types::decorators::ImportRef;
use cirrus_types::{CheckError, CheckedProgram, Diagnostics, InstanceKind, Value};
use serde::Serialize;
use std::fmt::Write as _;

#[derive(Debug, Serialize)]
pub struct Report {
    pub evaluation_order: Vec<String>,
    pub components: Vec<ComponentReport>,
    pub instances: Vec<InstanceReport>,
    pub deferred: Vec<DeferredReport>,
    pub globals: Vec<Binding>,
}

#[derive(Debug, Serialize)]
pub struct ComponentReport {
    pub name: String,
    pub evaluation_order: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct InstanceReport {
    pub name: String,
    /// `resource` or `component`
    pub kind: &'static str,
    /// Schema or component definition it instantiates.
    pub of: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    pub dependencies: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing: Option<Existing>,
}

#[derive(Debug, Serialize)]
pub struct Tag {
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Existing {
    pub reference: String,
    pub kind: ImportRef,
}

#[derive(Debug, Serialize)]
pub struct DeferredReport {
    pub decorator: &'static str,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct Binding {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

impl Report {
    pub fn new(program: &CheckedProgram) -> Self {
        let instances = program
            .instances()
            .map(|info| {
                let (kind, of) = match &info.kind {
                    InstanceKind::Resource { schema } => ("resource", schema.clone()),
                    InstanceKind::Component { component } => ("component", component.clone()),
                };
                InstanceReport {
                    name: info.name.clone(),
                    kind,
                    of,
                    component: info.component.clone(),
                    dependencies: info.dependencies.iter().cloned().collect(),
                    tags: info
                        .tags
                        .iter()
                        .map(|(key, value)| Tag {
                            key: key.clone(),
                            value: value.clone(),
                        })
                        .collect(),
                    providers: info.providers.iter().cloned().collect(),
                    count: info.count,
                    existing: info.existing.as_ref().map(|e| Existing {
                        reference: e.reference.clone(),
                        kind: e.kind,
                    }),
                }
            })
            .collect();

        Report {
            evaluation_order: program.evaluation_order().to_vec(),
            components: program
                .component_orders()
                .map(|(name, order)| ComponentReport {
                    name: name.to_string(),
                    evaluation_order: order.to_vec(),
                })
                .collect(),
            instances,
            deferred: program
                .deferred_checks()
                .iter()
                .map(|check| DeferredReport {
                    decorator: check.decorator(),
                    target: check.target().to_string(),
                    value: check.default_value().cloned(),
                })
                .collect(),
            globals: program
                .globals()
                .map(|(name, ty)| Binding {
                    name: name.to_string(),
                    ty: ty.to_string(),
                })
                .collect(),
        }
    }

    /// Human-readable rendering.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "evaluation order: {}", join_or_none(&self.evaluation_order));
        for c in &self.components {
            let _ = writeln!(
                out,
                "component {}: {}",
                c.name,
                join_or_none(&c.evaluation_order)
            );
        }
        if !self.instances.is_empty() {
            let _ = writeln!(out, "instances:");
            for i in &self.instances {
                let _ = write!(out, "  {} {} {}", i.kind, i.of, i.name);
                if !i.dependencies.is_empty() {
                    let _ = write!(out, " <- {}", i.dependencies.join(", "));
                }
                if let Some(e) = &i.existing {
                    let _ = write!(out, " [existing {}: {}]", e.kind, e.reference);
                }
                let _ = writeln!(out);
            }
        }
        if !self.deferred.is_empty() {
            let _ = writeln!(out, "deferred checks:");
            for d in &self.deferred {
                let _ = writeln!(out, "  @{} on {}", d.decorator, d.target);
            }
        }
        let _ = writeln!(out, "globals:");
        for b in &self.globals {
            let _ = writeln!(out, "  {}: {}", b.name, b.ty);
        }
        out
    }
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

/// One diagnostic for JSON output.
#[derive(Debug, Serialize)]
pub struct DiagnosticReport {
    pub kind: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
}

pub fn diagnostics(diags: &Diagnostics) -> Vec<DiagnosticReport> {
    diags
        .errors()
        .iter()
        .map(|err| DiagnosticReport {
            kind: match err {
                CheckError::TypeError { .. } => "type_error",
                CheckError::NotFound { .. } => "not_found",
                CheckError::DeclarationExists { .. } => "declaration_exists",
                CheckError::Cycle { .. } => "cycle",
                CheckError::Validation { .. } => "validation",
            },
            message: err.to_string(),
            span: err.span(),
        })
        .collect()
}
