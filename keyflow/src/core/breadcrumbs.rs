//! Per-scope breadcrumb trails for back navigation.
//!
//! Each scope is an independent stack: `EMPTY -> push -> TRAILING -> push* ->
//! TRAILING -> back -> TRAILING | EMPTY`. Scopes never interact.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::link::Location;

/// Destination reported by [`Breadcrumbs::back`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Back {
    /// New tail of the trail after dropping the current location.
    To(Location),
    /// Trail is empty; there is nowhere to go back to.
    NoPrior,
}

/// Observable state of a single scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailState {
    Empty,
    Trailing(usize),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Breadcrumbs {
    scopes: BTreeMap<String, Vec<Location>>,
}

impl Breadcrumbs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `location` to the scope's trail, creating the scope if needed.
    ///
    /// Returns `false` when the location equals the current tail (duplicate
    /// suppression), leaving the trail unchanged.
    pub fn push(&mut self, scope: &str, location: Location) -> bool {
        let trail = self.scopes.entry(scope.to_string()).or_default();
        if trail.last() == Some(&location) {
            return false;
        }
        trail.push(location);
        true
    }

    /// Drop the trail's last element and report the new tail.
    pub fn back(&mut self, scope: &str) -> Back {
        let Some(trail) = self.scopes.get_mut(scope) else {
            return Back::NoPrior;
        };
        trail.pop();
        match trail.last() {
            Some(location) => Back::To(location.clone()),
            None => Back::NoPrior,
        }
    }

    /// Remove a scope and its trail entirely.
    pub fn teardown(&mut self, scope: &str) -> Option<Vec<Location>> {
        self.scopes.remove(scope)
    }

    pub fn trail(&self, scope: &str) -> &[Location] {
        self.scopes.get(scope).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tail(&self, scope: &str) -> Option<&Location> {
        self.trail(scope).last()
    }

    pub fn state(&self, scope: &str) -> TrailState {
        match self.trail(scope).len() {
            0 => TrailState::Empty,
            len => TrailState::Trailing(len),
        }
    }

    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scopes.keys().map(String::as_str)
    }
}
