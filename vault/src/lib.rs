//! Guildvault — snapshot and restore for guild-style chat workspaces.
//!
//! A capture reads a live guild (roles, channel hierarchy, threads,
//! recent messages, emoji, bans, settings) into a portable [`snapshot::models::Document`];
//! a restore replays that document onto a target guild as an ordered
//! sequence of remote mutations, resolving name-based cross-references
//! against the target and absorbing partial failure at every step.
//!
//! All remote access goes through the [`remote::host::GuildHost`]
//! capability trait; [`remote::http::HttpGuildHost`] binds it to the
//! guild service REST API.

pub mod capture;
pub mod config;
pub mod error;
pub mod remote;
pub mod restore;
pub mod snapshot;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
