//! carrotfacts-sdk: a small async IRC client.
//!
//! Connects over TCP or TLS, performs registration, keeps the link alive
//! and exposes inbound traffic as [`event::Event`]s. Outbound commands go
//! through a cloneable [`client::ClientHandle`].

pub mod client;
pub mod event;
pub mod irc;
