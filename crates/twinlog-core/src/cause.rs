//! Cause-chain traversal.

use std::collections::HashSet;
use std::error::Error;

use crate::fault::Fault;

/// Titles of every cause reachable from `error`, nearest first.
///
/// The error itself is not included. Traversal stops at the first missing
/// cause or at the first node already visited, so self-referential or cyclic
/// `source()` graphs terminate.
pub fn cause_chain(error: &(dyn Error + 'static)) -> Vec<String> {
    let mut visited: HashSet<*const ()> = HashSet::new();
    let _ = visited.insert(address(error));

    let mut titles = Vec::new();
    let mut current = error.source();
    while let Some(node) = current {
        if !visited.insert(address(node)) {
            break;
        }
        titles.push(title(node));
        current = node.source();
    }
    titles
}

/// `"{name}: {message}"` for faults, the `Display` text otherwise.
pub fn title(node: &(dyn Error + 'static)) -> String {
    match node.downcast_ref::<Fault>() {
        Some(fault) => fault.title(),
        None => node.to_string(),
    }
}

fn address(node: &(dyn Error + 'static)) -> *const () {
    std::ptr::from_ref(node).cast::<()>()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
