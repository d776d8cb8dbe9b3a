//! Side-effecting collaborators: filesystem, processes, terminal.

pub mod auth;
pub mod config;
pub mod datastore;
pub mod detached;
pub mod dialogs;
pub mod documents;
pub mod functions;
pub mod init;
pub mod resources;
pub mod services;
pub mod session_store;
pub mod terminal;
pub mod workflows;
