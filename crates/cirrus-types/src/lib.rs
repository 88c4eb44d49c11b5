#![deny(unused_must_use)]
#![warn(clippy::dbg_macro, clippy::todo, clippy::unimplemented)]
#![forbid(unsafe_code)]

mod checker;
pub mod decorators;
pub mod env;
mod error;
pub mod graph;
mod program;
mod types;
pub mod value;

#[cfg(test)]
mod checker_tests;

pub use checker::{CheckerConfig, TypeChecker};
pub use decorators::{Decorator, DecoratorRegistry, DecoratorSpec, Target};
pub use env::{EnvError, ScopeId, TypeEnv};
pub use error::{CheckError, Diagnostics};
pub use graph::{CycleError, DependencyGraph, EdgeKind};
pub use program::{CheckedProgram, DeferredCheck, ExistingRef, InstanceInfo, InstanceKind};
pub use types::{ComponentType, Fields, ResourceType, SchemaType, Type, ValueType};
pub use value::Value;
