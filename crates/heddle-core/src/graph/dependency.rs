//! Dependency graph over task ids.
//!
//! Design:
//! - Forward edges: task -> tasks it depends on (in insertion order)
//! - Reverse edges: task -> tasks that depend on it
//! - Invariant: edges and reverse_edges must be kept in sync

use std::collections::{BTreeMap, HashMap, HashSet};

use crate::domain::{Task, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    /// On the current DFS path.
    Gray,
    /// Fully explored.
    Black,
}

/// Dependency graph for one job.
///
/// Vertices are kept sorted by id so that every derived ordering (terminal
/// tasks, cycle reports) is deterministic.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Forward edges: task -> tasks it depends on
    edges: BTreeMap<TaskId, Vec<TaskId>>,

    /// Reverse edges: task -> tasks waiting for it
    reverse_edges: HashMap<TaskId, HashSet<TaskId>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tasks<'a>(tasks: impl IntoIterator<Item = &'a Task>) -> Self {
        let mut graph = Self::new();
        for task in tasks {
            graph.add_vertex(task.id.clone());
            for dep in &task.dependencies {
                graph.add_dependency(task.id.clone(), dep.clone());
            }
        }
        graph
    }

    pub fn add_vertex(&mut self, task: TaskId) {
        self.edges.entry(task).or_default();
    }

    /// Add a dependency: `task` depends on `depends_on`.
    ///
    /// Returns false if the edge was already present.
    pub fn add_dependency(&mut self, task: TaskId, depends_on: TaskId) -> bool {
        let deps = self.edges.entry(task.clone()).or_default();
        if deps.contains(&depends_on) {
            return false;
        }
        deps.push(depends_on.clone());
        self.reverse_edges.entry(depends_on).or_default().insert(task);
        true
    }

    pub fn contains(&self, task: &TaskId) -> bool {
        self.edges.contains_key(task)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn dependencies_of(&self, task: &TaskId) -> &[TaskId] {
        self.edges.get(task).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Vertices nothing depends on.
    pub fn terminal_tasks(&self) -> Vec<TaskId> {
        self.edges
            .keys()
            .filter(|id| self.reverse_edges.get(*id).is_none_or(HashSet::is_empty))
            .cloned()
            .collect()
    }

    /// Detect a cycle with an iterative three-color DFS.
    ///
    /// Returns the cycle as a path that starts and ends on the same vertex
    /// (`[a, b, a]`), or None if the graph is acyclic. Edges to unknown
    /// vertices are treated as leaves.
    pub fn detect_cycle(&self) -> Option<Vec<TaskId>> {
        let mut colors: HashMap<&TaskId, Color> = HashMap::with_capacity(self.edges.len());

        for start in self.edges.keys() {
            if colors.contains_key(start) {
                continue;
            }
            // (vertex, index of the next dependency to explore)
            let mut stack: Vec<(&TaskId, usize)> = vec![(start, 0)];
            colors.insert(start, Color::Gray);

            while let Some(&(node, next)) = stack.last() {
                let deps = self.dependencies_of(node);
                if next == deps.len() {
                    colors.insert(node, Color::Black);
                    stack.pop();
                    continue;
                }
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }

                let dep = &deps[next];
                match colors.get(dep) {
                    Some(Color::Gray) => {
                        let pos = stack.iter().position(|(n, _)| *n == dep).unwrap_or(0);
                        let mut cycle: Vec<TaskId> =
                            stack[pos..].iter().map(|(n, _)| (*n).clone()).collect();
                        cycle.push(dep.clone());
                        return Some(cycle);
                    }
                    Some(Color::Black) => {}
                    None => {
                        colors.insert(dep, Color::Gray);
                        stack.push((dep, 0));
                    }
                }
            }
        }
        None
    }
}

/// Render a cycle path as `a -> b -> a` for error messages.
pub fn describe_cycle(cycle: &[TaskId]) -> String {
    cycle
        .iter()
        .map(TaskId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}
