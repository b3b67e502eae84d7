//! carrotfacts: an IRC bot that answers `.carrot` and `.turnip` with facts.
//!
//! - [`facts`]: loading fact files
//! - [`selector`]: random and round-robin fact selection
//! - [`router`]: chat text → reply
//! - [`session`]: connection lifecycle and shutdown

pub mod config;
pub mod error;
pub mod facts;
pub mod router;
pub mod selector;
pub mod session;
