//! Declarative menu and navigation runtime.
//!
//! Applications are described as documents of named blocks, each an ordered
//! set of `key: command` entries. The engine decides what a command runs,
//! how control returns afterwards and how navigation history is kept.
//!
//! - **[`core`]**: Pure, deterministic logic (modifier parsing, command
//!   classification, menus, breadcrumbs, links). No I/O.
//! - **[`io`]**: Side-effecting collaborators (documents on disk, processes,
//!   data tables, terminal). Reached only through the traits in
//!   [`core::collab`] so tests can script them.
//!
//! Orchestration modules ([`engine`], [`links`], [`runtime`], [`check`])
//! coordinate core logic with the collaborators.

pub mod check;
pub mod core;
pub mod engine;
pub mod exit_codes;
pub mod io;
pub mod links;
pub mod logging;
pub mod runtime;
pub mod templates;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
