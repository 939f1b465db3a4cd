//! Evaluator - タスクごとの判断ロジック
//!
//! エンジンは依存順に各タスクを Evaluator に渡します。Evaluator は
//! アキュムレータ（走査中だけ生きる共有の作業領域）を読み書きでき、
//! 実行してほしい Action のリストを返します。

use super::action::BoxedAction;
use crate::domain::{EngineError, InMemoryTask};

pub type Actions<A> = Vec<BoxedAction<A>>;

/// Per-task callback invoked during traversal.
///
/// `E` is the event the evaluation was started with. `A` is the accumulator
/// shared by every call in one pass.
pub trait Evaluator<E, A>: Send + Sync {
    fn evaluate(
        &self,
        task: &InMemoryTask,
        event: &E,
        accumulator: &mut A,
    ) -> Result<Actions<A>, EngineError>;
}

impl<E, A, F> Evaluator<E, A> for F
where
    F: Fn(&InMemoryTask, &E, &mut A) -> Result<Actions<A>, EngineError> + Send + Sync,
{
    fn evaluate(
        &self,
        task: &InMemoryTask,
        event: &E,
        accumulator: &mut A,
    ) -> Result<Actions<A>, EngineError> {
        self(task, event, accumulator)
    }
}

impl<E, A, V> Evaluator<E, A> for std::sync::Arc<V>
where
    V: Evaluator<E, A> + ?Sized,
{
    fn evaluate(
        &self,
        task: &InMemoryTask,
        event: &E,
        accumulator: &mut A,
    ) -> Result<Actions<A>, EngineError> {
        (**self).evaluate(task, event, accumulator)
    }
}

/// Pin a closure to the evaluator signature so its argument types are
/// inferred.
///
/// ```ignore
/// let evaluator = evaluator_fn(|task, _event: &Event, acc: &mut Vec<String>| {
///     acc.push(task.id.to_string());
///     Ok(Vec::new())
/// });
/// ```
pub fn evaluator_fn<E, A, F>(f: F) -> F
where
    F: Fn(&InMemoryTask, &E, &mut A) -> Result<Actions<A>, EngineError> + Send + Sync,
{
    f
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::action::{Action, NoopAction};
    use crate::domain::{Task, Vertex};
    use chrono::Utc;
    use serde_json::json;

    fn in_memory(id: &str) -> InMemoryTask {
        Task::from_vertex(&Vertex::new(id, "t", json!({})), Utc::now()).to_in_memory()
    }

    #[test]
    fn closures_are_evaluators() {
        let evaluator = evaluator_fn(|task, event: &u32, acc: &mut Vec<String>| {
            acc.push(format!("{}:{}", task.id, event));
            Ok(vec![NoopAction.boxed()])
        });

        let mut acc = Vec::new();
        let actions = evaluator.evaluate(&in_memory("a"), &7, &mut acc).unwrap();
        assert_eq!(acc, vec!["a:7".to_string()]);
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn shared_evaluators_delegate() {
        let evaluator: std::sync::Arc<dyn Evaluator<(), usize>> =
            std::sync::Arc::new(evaluator_fn(|_task, _event: &(), acc: &mut usize| {
                *acc += 1;
                Ok(Vec::new())
            }));

        let mut count = 0;
        evaluator.evaluate(&in_memory("a"), &(), &mut count).unwrap();
        evaluator.evaluate(&in_memory("b"), &(), &mut count).unwrap();
        assert_eq!(count, 2);
    }
}
