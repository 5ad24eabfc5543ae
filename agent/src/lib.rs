//! Warden agent runtime core.
//!
//! Consumes an ordered stream of gateway events into a local replica of
//! guild state, gates command availability on replica completeness, and
//! drives the slash-command acknowledgement protocol against its deadline.
//! Transport (gateway connection, shard management) and command business
//! logic live in collaborator crates; they talk to this core through
//! [`engine::Bot`], [`registry::Registry`] and [`http::Api`].

pub mod colors;
pub mod config;
pub mod engine;
pub mod errors;
pub mod http;
pub mod interactions;
pub mod registry;
pub mod store;


#[cfg(test)]
pub(crate) mod testutil;
