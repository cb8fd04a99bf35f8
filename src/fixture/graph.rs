//! Cycle detection over the registration graph.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::fixture::registration::Registration;

/// First dependency cycle reachable from `root`, as a path that starts and
/// ends on the same fixture. Names without a registration are ignored here;
/// they fail with `UnknownFixture` once resolution actually reaches them.
pub(crate) fn find_cycle(
    registrations: &HashMap<String, Arc<Registration>>,
    root: &str,
) -> Option<Vec<String>> {
    let mut path = Vec::new();
    let mut finished = HashSet::new();
    visit(registrations, root, &mut path, &mut finished)
}

fn visit<'a>(
    registrations: &'a HashMap<String, Arc<Registration>>,
    name: &'a str,
    path: &mut Vec<&'a str>,
    finished: &mut HashSet<&'a str>,
) -> Option<Vec<String>> {
    if let Some(start) = path.iter().position(|entry| *entry == name) {
        let mut cycle: Vec<String> = path[start..].iter().map(|n| n.to_string()).collect();
        cycle.push(name.to_string());
        return Some(cycle);
    }
    if finished.contains(name) {
        return None;
    }
    let registration = registrations.get(name)?;

    path.push(name);
    for dependency in registration.dependencies().iter() {
        if let Some(cycle) = visit(registrations, dependency, path, finished) {
            return Some(cycle);
        }
    }
    path.pop();
    finished.insert(name);
    None
}
