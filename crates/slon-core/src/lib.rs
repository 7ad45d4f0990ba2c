//! SLON Core - An embeddable semantic network on SQLite
//!
//! SLON stores knowledge as a network of small composite values and lets you
//! query it with wildcards.
//!
//! # Architecture
//!
//! SLON is built on four layers, each interning the one below:
//!
//! 1. **Symbols** (`symbol`): deduplicated text atoms; `*` matches anything
//! 2. **Objects** (`object`): ordered `left | right` pairs of symbols
//! 3. **Nodes** (`node`): an effect object plus an optional payload object
//! 4. **Network** (`network`): append-only entries placing a node in a context
//!
//! The query engine (`query`) finds, inserts and deletes entries by pattern,
//! and `display` derives the human-readable ids and JSON projections.
//!
//! # Quick Start
//!
//! ```
//! use slon_core::{NodeTerm, Query, Slon};
//!
//! let slon = Slon::open_in_memory()?;
//!
//! // A program with a trace of steps
//! let program = slon.insert(("program", "A"), ())?;
//! slon.insert(NodeTerm::binary(("*", "*"), ("js", "() => {}")), &program)?;
//! let trace = slon.insert(("trace", "A"), ())?;
//! slon.insert_all([("step", "1"), ("step", "2")], &trace)?;
//!
//! // The trace named after the program, then its steps
//! let steps = slon.run(&Query::new(("trace", Query::new(("program", "*")))).then(("step", "*")))?;
//! let shown: Vec<String> = steps.iter().map(ToString::to_string).collect();
//! assert_eq!(shown, ["4. step | 1 & null", "5. step | 2 & null"]);
//!
//! // Deleting the program cascades to its code
//! let removed = slon.delete(("program", "*"), ())?;
//! assert_eq!(removed.len(), 2);
//! # Ok::<(), slon_core::SlonError>(())
//! ```
//!
//! # Features
//!
//! - **Interning**: every symbol, object and node is stored exactly once
//! - **Wildcards**: `*` on either side of a pattern matches any symbol
//! - **Context chains**: queries nest, feeding results in as the next context
//! - **Joins**: lateral multi-level joins ordered by entry id
//! - **Policies**: tree or graph topology, cascading or rejecting deletes

#![deny(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod config;
pub mod display;
pub mod error;
pub mod network;
pub mod node;
pub mod object;
pub mod query;
pub mod store;
pub mod symbol;
pub mod term;

pub use config::{CascadePolicy, SlonConfig, Topology};
pub use error::{Result, ResultExt, SlonError};
pub use network::{Context, Entry, EntryId};
pub use node::{Node, NodeShape};
pub use object::{pairs_match, Object};
pub use query::{Join, Matches, Query, Scope};
pub use store::Slon;
pub use symbol::{symbols_match, Symbol, WILDCARD};
pub use term::{NodeTerm, ObjectTerm, Pattern, PayloadPattern, SymbolTerm};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
