//! Post-order traversal of a reconstituted graph.
//!
//! 再帰は使わず、明示的なスタックと頂点ごとの状態で深さ優先探索します。
//! 依存が循環していても各タスクは高々 1 回しか訪問されません。

use std::collections::HashMap;

use tracing::{debug, warn};

use super::reconstitute::ReconstitutedTaskGraph;
use crate::domain::{EngineError, Task, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VisitState {
    NotEvaluated,
    ChildrenPending,
    EvaluationDone,
}

/// Visit every task once, dependencies before dependents.
///
/// The walk starts from the terminal tasks. Any task it does not reach (only
/// possible when dependencies form a cycle) seeds a further walk, in id
/// order, until every task has been visited. Dependencies naming a task that
/// is not in the graph are skipped with a warning.
///
/// Returns the number of tasks visited. The first error from `visit` stops
/// the traversal.
pub fn post_order<F>(graph: &ReconstitutedTaskGraph, mut visit: F) -> Result<usize, EngineError>
where
    F: FnMut(&Task) -> Result<(), EngineError>,
{
    let mut states: HashMap<&TaskId, VisitState> = HashMap::with_capacity(graph.len());
    let mut stack: Vec<&TaskId> = graph.terminal_tasks().iter().collect();
    let mut visited = 0;

    if stack.is_empty() && !graph.is_empty() {
        debug!("no terminal tasks, starting from an arbitrary task");
    }

    loop {
        while let Some(&task_id) = stack.last() {
            let Some(task) = graph.get(task_id) else {
                stack.pop();
                continue;
            };
            let state = states
                .get(task_id)
                .copied()
                .unwrap_or(VisitState::NotEvaluated);

            match state {
                VisitState::NotEvaluated => {
                    states.insert(task_id, VisitState::ChildrenPending);
                    for dep in &task.dependencies {
                        if !graph.contains(dep) {
                            warn!(task_id = %task_id, dependency = %dep, "dependency not in graph, skipping");
                            continue;
                        }
                        if !states.contains_key(dep) {
                            stack.push(dep);
                        }
                    }
                }
                VisitState::ChildrenPending => {
                    visit(task)?;
                    visited += 1;
                    states.insert(task_id, VisitState::EvaluationDone);
                }
                VisitState::EvaluationDone => {
                    stack.pop();
                }
            }
        }

        match graph.tasks().keys().find(|id| !states.contains_key(id)) {
            Some(unreached) => stack.push(unreached),
            None => break,
        }
    }

    Ok(visited)
}
