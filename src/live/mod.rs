//! Live session client: the duplex connection actor and its wire types.

pub mod client;
pub mod messages;

pub use client::{LiveClient, LiveCommand, LiveEvent, LiveHandle};
pub use messages::{RealtimeInputMessage, ServerContent, ServerMessage, SetupMessage};
