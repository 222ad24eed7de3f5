#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

pub mod adapters;
pub mod config;
pub mod entities;
pub mod events;
pub mod processors;
pub mod sources;
pub mod supervisor;
pub mod utils;
