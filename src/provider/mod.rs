//! The dependency-injection core (C4/C5): provider identity, graph construction, and
//! the resolver/scope manager, plus the mock and resource-release side concerns.

pub mod descriptor;
pub mod graph;
pub mod mock;
pub mod resolver;
pub mod resource;
pub mod source;
pub mod spec;
