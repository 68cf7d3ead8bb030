//! Infrastructure layer: storage, command dispatch, collaborators, config.

pub mod command_dispatcher;
pub mod config;
pub mod notify;
pub mod roster;
pub mod service;
pub mod store;
pub mod workers;
