//! Validation and ordering of a job's command graph.
//!
//! Ordering is Kahn's algorithm over the `depends_on` relation. Among
//! commands that are ready at the same time, higher priority goes first,
//! then earlier emission.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use fp_core::{Error, Result};

use crate::command::Command;

/// Order `commands` so each one follows everything it depends on.
///
/// # Errors
///
/// [`Error::Graph`] for duplicate command names, references to commands
/// that were not emitted, or a dependency cycle. No partial order is
/// returned.
pub fn order(commands: Vec<Command>) -> Result<Vec<Command>> {
    let mut index: BTreeMap<&str, usize> = BTreeMap::new();
    for (i, cmd) in commands.iter().enumerate() {
        if index.insert(cmd.name(), i).is_some() {
            return Err(Error::graph(format!("duplicate command name '{}'", cmd.name())));
        }
    }

    let mut in_degree = vec![0usize; commands.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); commands.len()];
    for (i, cmd) in commands.iter().enumerate() {
        for dep in cmd.dependencies() {
            let &d = index.get(dep.as_str()).ok_or_else(|| {
                Error::graph(format!(
                    "command '{}' depends on unknown command '{dep}'",
                    cmd.name()
                ))
            })?;
            in_degree[i] += 1;
            dependents[d].push(i);
        }
    }

    let mut ready: BinaryHeap<(i32, Reverse<usize>)> = in_degree
        .iter()
        .enumerate()
        .filter(|&(_, &deg)| deg == 0)
        .map(|(i, _)| (commands[i].get_priority(), Reverse(i)))
        .collect();

    let mut sequence = Vec::with_capacity(commands.len());
    while let Some((_, Reverse(i))) = ready.pop() {
        sequence.push(i);
        for &next in &dependents[i] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push((commands[next].get_priority(), Reverse(next)));
            }
        }
    }

    if sequence.len() != commands.len() {
        let stuck: Vec<&str> = in_degree
            .iter()
            .enumerate()
            .filter(|&(_, &deg)| deg > 0)
            .map(|(i, _)| commands[i].name())
            .collect();
        return Err(Error::graph(format!(
            "dependency cycle among: {}",
            stuck.join(", ")
        )));
    }

    let mut slots: Vec<Option<Command>> = commands.into_iter().map(Some).collect();
    Ok(sequence
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect())
}
