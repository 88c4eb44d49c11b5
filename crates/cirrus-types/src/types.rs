//! Core `Type` definitions for cirrus.
//!
//! Types are structural: objects compare by their field sets and unions by
//! their variant sets. Insertion order is kept for diagnostics only.

use indexmap::IndexMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ValueType {
    Number,
    String,
    Boolean,
    Null,
    Void,
    Any,
}

impl ValueType {
    pub fn keyword(self) -> &'static str {
        match self {
            ValueType::Number => "number",
            ValueType::String => "string",
            ValueType::Boolean => "boolean",
            ValueType::Null => "null",
            ValueType::Void => "void",
            ValueType::Any => "any",
        }
    }

    pub fn from_keyword(name: &str) -> Option<Self> {
        match name {
            "number" => Some(ValueType::Number),
            "string" => Some(ValueType::String),
            "boolean" => Some(ValueType::Boolean),
            "null" => Some(ValueType::Null),
            "void" => Some(ValueType::Void),
            "any" => Some(ValueType::Any),
            _ => None,
        }
    }
}

/// Ordered name -> type table (object fields, schema properties, component inputs).
pub type Fields = IndexMap<String, Type>;

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Type {
    /// Primitive values.
    Value(ValueType),
    /// `T[]`
    Array(Box<Type>),
    /// Structural object; an empty field table is the open `object` type.
    Object(Fields),
    /// Set of alternatives; never nested, never a single variant (see [`Type::union`]).
    Union(Vec<Type>),
    /// `(params) -> ret`
    Function { params: Vec<Type>, ret: Box<Type> },
    Schema(SchemaType),
    Resource(ResourceType),
    Component(ComponentType),
}

/// Blueprint for resources.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SchemaType {
    pub name: String,
    pub properties: Fields,
    /// Instances declared in the schema's own scope.
    pub instances: IndexMap<String, ResourceType>,
}

/// One concrete instance of a schema.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ResourceType {
    pub name: String,
    pub schema: String,
    pub properties: Fields,
}

/// A component definition (`instance == None`) or one named instantiation of it.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ComponentType {
    pub name: String,
    pub instance: Option<String>,
    pub inputs: Fields,
    pub outputs: Fields,
    /// Resources and component instances declared in the body.
    pub nested: Vec<Type>,
}

impl ComponentType {
    pub fn is_definition(&self) -> bool {
        self.instance.is_none()
    }

    /// Instantiate this definition under `name`.
    pub fn instantiate(&self, name: &str) -> ComponentType {
        ComponentType {
            instance: Some(name.to_string()),
            ..self.clone()
        }
    }
}

impl Type {
    pub fn number() -> Self {
        Type::Value(ValueType::Number)
    }
    pub fn string() -> Self {
        Type::Value(ValueType::String)
    }
    pub fn boolean() -> Self {
        Type::Value(ValueType::Boolean)
    }
    pub fn null() -> Self {
        Type::Value(ValueType::Null)
    }
    pub fn void() -> Self {
        Type::Value(ValueType::Void)
    }
    pub fn any() -> Self {
        Type::Value(ValueType::Any)
    }
    pub fn array(elem: Type) -> Self {
        Type::Array(Box::new(elem))
    }
    pub fn object<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, Type)>,
        S: Into<String>,
    {
        Type::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
    pub fn function(params: Vec<Type>, ret: Type) -> Self {
        Type::Function {
            params,
            ret: Box::new(ret),
        }
    }

    /// Build a normalised union: nested unions are flattened, duplicates
    /// dropped, and a single remaining variant is returned as itself.
    pub fn union(variants: impl IntoIterator<Item = Type>) -> Self {
        let mut flat: Vec<Type> = Vec::new();
        for v in variants {
            let parts = match v {
                Type::Union(inner) => inner,
                other => vec![other],
            };
            for p in parts {
                if !flat.contains(&p) {
                    flat.push(p);
                }
            }
        }
        if flat.len() == 1 {
            flat.remove(0)
        } else {
            Type::Union(flat)
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Type::Value(ValueType::Any))
    }

    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Type::Value(v) => Some(*v),
            _ => None,
        }
    }

    pub fn element(&self) -> Option<&Type> {
        match self {
            Type::Array(elem) => Some(elem),
            _ => None,
        }
    }

    /// Name of the resource/component instance this type describes, if any.
    pub fn instance_name(&self) -> Option<&str> {
        match self {
            Type::Resource(r) => Some(&r.name),
            Type::Component(c) => c.instance.as_deref(),
            _ => None,
        }
    }

    /// Whether a value of type `self` may be stored where `target` is expected.
    ///
    /// Unlike `==`, `any` on either side is accepted here.
    pub fn is_assignable_to(&self, target: &Type) -> bool {
        if self.is_any() || target.is_any() || self == target {
            return true;
        }
        match (self, target) {
            (Type::Union(variants), _) => variants.iter().all(|v| v.is_assignable_to(target)),
            (_, Type::Union(variants)) => variants.iter().any(|v| self.is_assignable_to(v)),
            (Type::Array(a), Type::Array(b)) => a.is_assignable_to(b),
            (Type::Object(_), Type::Object(expected)) if expected.is_empty() => true,
            (Type::Object(actual), Type::Object(expected)) => {
                actual.len() == expected.len()
                    && expected.iter().all(|(name, want)| {
                        actual
                            .get(name)
                            .is_some_and(|have| have.is_assignable_to(want))
                    })
            }
            (Type::Resource(a), Type::Schema(s)) => a.schema == s.name,
            (Type::Component(a), Type::Component(b)) => a.name == b.name,
            _ => false,
        }
    }
}

impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Type::Value(a), Type::Value(b)) => a == b,
            (Type::Array(a), Type::Array(b)) => a == b,
            // IndexMap equality ignores insertion order and fails on extra keys.
            (Type::Object(a), Type::Object(b)) => a == b,
            (Type::Union(a), Type::Union(b)) => {
                a.len() == b.len() && a.iter().all(|v| b.contains(v))
            }
            (
                Type::Function {
                    params: pa,
                    ret: ra,
                },
                Type::Function {
                    params: pb,
                    ret: rb,
                },
            ) => pa == pb && ra == rb,
            (Type::Schema(a), Type::Schema(b)) => a.name == b.name,
            (Type::Resource(a), Type::Resource(b)) => a.name == b.name && a.schema == b.schema,
            (Type::Component(a), Type::Component(b)) => {
                a.name == b.name && a.instance == b.instance
            }
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Value(v) => write!(f, "{}", v.keyword()),
            Type::Array(elem) => match **elem {
                Type::Union(_) | Type::Function { .. } => write!(f, "({})[]", elem),
                _ => write!(f, "{}[]", elem),
            },
            Type::Object(fields) if fields.is_empty() => write!(f, "object"),
            Type::Object(fields) => {
                write!(f, "{{ ")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", name, ty)?;
                }
                write!(f, " }}")
            }
            Type::Union(variants) => {
                for (i, v) in variants.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", v)?;
                }
                Ok(())
            }
            Type::Function { params, ret } => {
                write!(f, "(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p)?;
                }
                write!(f, ") -> {}", ret)
            }
            Type::Schema(s) => write!(f, "schema {}", s.name),
            Type::Resource(r) => write!(f, "resource {} {}", r.schema, r.name),
            Type::Component(c) => match &c.instance {
                Some(inst) => write!(f, "component {} {}", c.name, inst),
                None => write!(f, "component {}", c.name),
            },
        }
    }
}
