//! Human-readable ids and JSON projections
//!
//! Display ids are built bottom-up and never stored:
//!
//! | entity | display id |
//! |--------|------------|
//! | symbol | `A` |
//! | object | `program | A` |
//! | node   | `program | A & null`, `* | * & js | () => {}` |
//! | entry  | `1. program | A & null` |
//!
//! The [`Serialize`] impls produce the structured projection: every entity
//! carries its display id as `id` and nests the projections of its parts.

use crate::network::{Entry, EntryId};
use crate::node::Node;
use crate::object::Object;
use crate::symbol::Symbol;
use crate::term::NULL_PAYLOAD;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {}", self.left(), self.right())
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.payload() {
            Some(payload) => write!(f, "{} & {}", self.effect(), payload),
            None => write!(f, "{} & {NULL_PAYLOAD}", self.effect()),
        }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {}", self.id(), self.node())
    }
}

impl Serialize for Symbol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Symbol", 2)?;
        s.serialize_field("id", self.text())?;
        s.serialize_field("index", &self.index())?;
        s.end()
    }
}

impl Serialize for Object {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Object", 4)?;
        s.serialize_field("id", &self.to_string())?;
        s.serialize_field("index", &self.index())?;
        s.serialize_field("left", self.left())?;
        s.serialize_field("right", self.right())?;
        s.end()
    }
}

impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Node", 4)?;
        s.serialize_field("id", &self.to_string())?;
        s.serialize_field("index", &self.index())?;
        s.serialize_field("effect", self.effect())?;
        s.serialize_field("payload", &self.payload())?;
        s.end()
    }
}

impl Serialize for Entry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Entry", 2)?;
        s.serialize_field("id", &self.to_string())?;
        s.serialize_field("node", self.node())?;
        s.end()
    }
}
