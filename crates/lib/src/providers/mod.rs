//! # Providers
//!
//! External collaborators behind traits: the completion service (`ai`) and the
//! data store (`db`).

pub mod ai;
pub mod db;
pub mod factory;
