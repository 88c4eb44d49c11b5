//! Reference parser for cirrus source: schemas, resources, components,
//! inputs/outputs, vars, functions and type aliases, each with decorators.

#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(clippy::dbg_macro, clippy::todo, clippy::unimplemented)]

mod lexer;
mod parser;
mod token;

pub use parser::parse_str;
