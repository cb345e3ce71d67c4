//! Crowd Grid Server - a single shared board moved by crowd vote
//!
//! Players cast one direction per voting window; once per tick a random
//! fresh vote moves the avatar, which may collect the coin or hit the bomb.
//! Transport, identity and rendering live outside this crate.

pub mod app;
pub mod config;
pub mod game;
pub mod store;
pub mod util;
