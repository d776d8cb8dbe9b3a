//! Deterministic, pure logic shared by the dispatch engine.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod breadcrumbs;
pub mod collab;
pub mod command;
pub mod error;
pub mod history;
pub mod link;
pub mod menu;
pub mod modifiers;
pub mod session;
pub mod types;
