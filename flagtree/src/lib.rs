//! A library for building hierarchical command-line interfaces in which each
//! command is backed by a user-defined parameter record.
//!
//! Raw program arguments are routed to the correct leaf command by walking a
//! subcommand trie ([`mux`]), parsed into flags and positional values
//! according to that leaf's declared shape ([`parser`], [`spec`]), and
//! materialized into a fully-populated value by first applying
//! user-registered defaults ([`rules`]) and then overlaying the parsed input
//! ([`decode`]). [`runtime::Runtime`] composes all four into the object an
//! embedder actually builds against.
//!
//! ```
//! use flagtree::Params;
//!
//! #[derive(Params, Default, Debug)]
//! struct Greet {
//!     #[flagtree(flag = "name")]
//!     name: String,
//!     #[flagtree(flag = "loud")]
//!     loud: bool,
//!     #[flagtree(arg = ":")]
//!     rest: Vec<String>,
//! }
//!
//! let mut runtime = flagtree::Runtime::<()>::new();
//! runtime
//!     .register_exec(&["greet"], |g: Greet| {
//!         println!("{:?}", g);
//!         Ok(())
//!     })
//!     .unwrap();
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::doc_markdown)]

/// Shared error taxonomy: severities, per-component error kinds, conversions.
pub mod error;
/// Derives a structured description of a parameter record's flags, argument
/// slots, and inlined sub-records.
pub mod spec;
/// Tokenizes a raw value sequence into flags and residual positional values.
pub mod parser;
/// Type-indexed registry of default-assignment closures.
pub mod rules;
/// Overlays parsed flags and positional arguments onto a parameter record.
pub mod decode;
/// Trie of commands keyed by target path.
pub mod mux;
/// Composes [`mux`] and [`rules`] into the object an embedder builds against.
pub mod runtime;

pub use decode::{DecodeConfig, FromParamText, ParamValue};
pub use error::{DecodeError, ExecuteError, HandlerError, MuxError, ParseError, Severity, SpecError};
pub use mux::{Input, Mux, MuxConfig};
pub use rules::Rules;
pub use runtime::{FrozenRuntime, Runtime};
pub use spec::{ParamSpec, Params, SpecConfig};

pub use flagtree_derive::Params;
