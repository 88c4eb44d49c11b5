//! `@validate(regex = "...", flags = "i", message = "...")` or `@validate(preset = "kebab")`.

use super::{
    check_shape, named_str, ArgShape, Decorator, DecoratorSpec, LitKind, NamedParam,
    Restriction, Target, TypeClass,
};
use crate::error::CheckError;
use crate::types::ValueType;
use crate::value::Value;
use cirrus_ast::ast::{Annotation, AnnotationArgs};
use indexmap::IndexMap;
use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};

const STRING: &[LitKind] = &[LitKind::String];

static SPEC: DecoratorSpec = DecoratorSpec {
    name: "validate",
    shape: ArgShape::Named(&[
        NamedParam {
            name: "regex",
            kinds: STRING,
            required: false,
        },
        NamedParam {
            name: "preset",
            kinds: STRING,
            required: false,
        },
        NamedParam {
            name: "flags",
            kinds: STRING,
            required: false,
        },
        NamedParam {
            name: "message",
            kinds: STRING,
            required: false,
        },
    ]),
    targets: &[Target::Input],
    restriction: Restriction::OneOf(&[
        TypeClass::String,
        TypeClass::ArrayOf(ValueType::String),
    ]),
    instances_only: false,
    deferred: true,
};

/// Named patterns usable as `preset = "..."`.
pub const PRESETS: &[(&str, &str)] = &[
    ("dns_label", r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$"),
    (
        "rfc1123",
        r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?(\.[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?)*$",
    ),
    ("kebab", r"^[a-z0-9]+(-[a-z0-9]+)*$"),
    ("snake", r"^[a-z0-9]+(_[a-z0-9]+)*$"),
    ("camel", r"^[a-z][a-zA-Z0-9]*$"),
    ("pascal", r"^[A-Z][a-zA-Z0-9]*$"),
    ("alphanumeric", r"^[A-Za-z0-9]+$"),
    ("email", r"^[^@\s]+@[^@\s]+\.[^@\s]+$"),
    (
        "uuid",
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
    ),
    (
        "ipv4",
        r"^((25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])\.){3}(25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])$",
    ),
    (
        "cidr",
        r"^((25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])\.){3}(25[0-5]|2[0-4][0-9]|1[0-9]{2}|[1-9]?[0-9])/(3[0-2]|[12]?[0-9])$",
    ),
];

lazy_static! {
    static ref PRESET_TABLE: IndexMap<&'static str, &'static str> =
        PRESETS.iter().copied().collect();
}

const FLAGS: &str = "imsx";

/// The pattern the arguments select, and how to name it in messages.
fn pattern(args: &AnnotationArgs) -> Result<(String, String), String> {
    if let Some(regex) = named_str(args, "regex") {
        return Ok((regex.to_string(), format!("pattern {}", regex)));
    }
    let Some(preset) = named_str(args, "preset") else {
        return Err("@validate requires 'regex' or 'preset'".to_string());
    };
    match PRESET_TABLE.get(preset) {
        Some(p) => Ok((p.to_string(), format!("preset {}", preset))),
        None => {
            let known: Vec<&str> = PRESET_TABLE.keys().copied().collect();
            Err(format!(
                "@validate preset '{}' is not one of: {}",
                preset,
                known.join(", ")
            ))
        }
    }
}

fn compile(args: &AnnotationArgs) -> Result<(Regex, String), String> {
    let (source, label) = pattern(args)?;
    let flags = named_str(args, "flags").unwrap_or("");
    if let Some(bad) = flags.chars().find(|c| !FLAGS.contains(*c)) {
        return Err(format!(
            "@validate flag '{}' is not supported (expected i, m, s or x)",
            bad
        ));
    }
    let regex = RegexBuilder::new(&source)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .ignore_whitespace(flags.contains('x'))
        .build()
        .map_err(|_| format!("@validate regex \"{}\" is not a valid pattern", source))?;
    Ok((regex, label))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Validate;

impl Decorator for Validate {
    fn spec(&self) -> &DecoratorSpec {
        &SPEC
    }

    /// Also compiles the pattern, so a bad regex never reaches evaluation.
    fn shape_check(&self, ann: &Annotation) -> Result<(), CheckError> {
        check_shape(&SPEC, ann)?;
        if named_str(&ann.args, "regex").is_some() && named_str(&ann.args, "preset").is_some() {
            return Err(CheckError::type_error(
                "@validate takes either 'regex' or 'preset', not both",
                ann.span,
            ));
        }
        compile(&ann.args)
            .map(|_| ())
            .map_err(|msg| CheckError::type_error(msg, ann.span))
    }

    fn validate_value(&self, args: &AnnotationArgs, value: &Value) -> Result<(), String> {
        let (regex, label) = compile(args)?;
        let custom = named_str(args, "message");
        let fail = |what: String| match custom {
            Some(msg) => format!("{}: {}", what, msg),
            None => format!("{} does not match {}", what, label),
        };
        match value {
            Value::String(s) if !regex.is_match(s) => Err(fail(format!("value {}", value))),
            Value::String(_) => Ok(()),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    let ok = item.as_str().is_some_and(|s| regex.is_match(s));
                    if !ok {
                        return Err(fail(format!("element at index {} ({})", i, item)));
                    }
                }
                Ok(())
            }
            other => Err(format!("expected a string, found {}", other.kind())),
        }
    }
}
