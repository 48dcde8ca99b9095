//! Route matching and request dispatch (C6).

pub mod dispatcher;
pub mod route;
pub mod router;
