use std::collections::HashSet;
use std::time::Duration;

use super::{run_capture, ChildrenIndex, ParentMap, Pid};

/// List every live process with its parent via `ps`
pub async fn list_parents(timeout: Duration) -> ParentMap {
    match run_capture("ps", &["-eo", "pid,ppid"], timeout).await {
        Some(out) => parse_parent_listing(&out),
        None => ParentMap::new(),
    }
}

/// Parse `pid ppid` lines. Headers and lines with non-numeric fields are skipped.
pub fn parse_parent_listing(output: &str) -> ParentMap {
    let mut parents = ParentMap::new();

    for line in output.lines() {
        let mut fields = line.split_whitespace();
        let (Some(pid), Some(ppid)) = (fields.next(), fields.next()) else {
            continue;
        };
        if let (Ok(pid), Ok(ppid)) = (pid.parse::<Pid>(), ppid.parse::<Pid>()) {
            parents.insert(pid, ppid);
        }
    }

    parents
}

/// Invert a parent map into parent -> direct children
pub fn build_children_index(parents: &ParentMap) -> ChildrenIndex {
    let mut children = ChildrenIndex::new();
    for (&pid, &ppid) in parents {
        children.entry(ppid).or_default().push(pid);
    }
    children
}

/// All pids transitively below `root`, never including `root` itself.
///
/// Iterative with a visited set, so it terminates on cyclic input.
pub fn descendants(root: Pid, children: &ChildrenIndex) -> HashSet<Pid> {
    let mut found = HashSet::new();
    let mut stack = vec![root];

    while let Some(pid) = stack.pop() {
        let Some(kids) = children.get(&pid) else {
            continue;
        };
        for &kid in kids {
            if kid != root && found.insert(kid) {
                stack.push(kid);
            }
        }
    }

    found
}
