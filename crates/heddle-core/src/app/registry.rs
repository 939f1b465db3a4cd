//! EvaluatorRegistry - task_type ごとの Evaluator 登録
//!
//! 1 つの Evaluator の中で task_type を if/else で分岐する代わりに、
//! task_type → Evaluator のマップで振り分けます。

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use super::evaluator::{Actions, Evaluator};
use crate::domain::{EngineError, InMemoryTask, TaskType};

/// RegistryError は EvaluatorRegistry の操作エラー
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("evaluator for task type '{0}' is already registered")]
    AlreadyRegistered(String),
}

/// Dispatches each task to the evaluator registered for its type.
///
/// Tasks of an unregistered type go to the fallback evaluator if one is set;
/// otherwise they produce no actions.
pub struct EvaluatorRegistry<E, A> {
    evaluators: HashMap<TaskType, Arc<dyn Evaluator<E, A>>>,
    fallback: Option<Arc<dyn Evaluator<E, A>>>,
}

impl<E, A> EvaluatorRegistry<E, A> {
    pub fn new() -> Self {
        Self {
            evaluators: HashMap::new(),
            fallback: None,
        }
    }

    pub fn register(
        &mut self,
        task_type: impl Into<TaskType>,
        evaluator: impl Evaluator<E, A> + 'static,
    ) -> Result<(), RegistryError> {
        let task_type = task_type.into();
        if self.evaluators.contains_key(&task_type) {
            return Err(RegistryError::AlreadyRegistered(task_type.to_string()));
        }
        self.evaluators.insert(task_type, Arc::new(evaluator));
        Ok(())
    }

    /// Builder-style `register`.
    pub fn with(
        mut self,
        task_type: impl Into<TaskType>,
        evaluator: impl Evaluator<E, A> + 'static,
    ) -> Result<Self, RegistryError> {
        self.register(task_type, evaluator)?;
        Ok(self)
    }

    pub fn with_fallback(mut self, evaluator: impl Evaluator<E, A> + 'static) -> Self {
        self.fallback = Some(Arc::new(evaluator));
        self
    }

    pub fn get(&self, task_type: &str) -> Option<Arc<dyn Evaluator<E, A>>> {
        self.evaluators.get(task_type).cloned()
    }

    /// Registered task types, sorted.
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.evaluators.keys().map(ToString::to_string).collect();
        types.sort();
        types
    }
}

impl<E, A> Default for EvaluatorRegistry<E, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, A> Evaluator<E, A> for EvaluatorRegistry<E, A> {
    fn evaluate(
        &self,
        task: &InMemoryTask,
        event: &E,
        accumulator: &mut A,
    ) -> Result<Actions<A>, EngineError> {
        match self
            .evaluators
            .get(task.task_type.as_str())
            .or(self.fallback.as_ref())
        {
            Some(evaluator) => evaluator.evaluate(task, event, accumulator),
            None => {
                trace!(task_id = %task.id, task_type = %task.task_type, "no evaluator registered");
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::evaluator::evaluator_fn;
    use crate::domain::{Task, Vertex};
    use chrono::Utc;
    use serde_json::json;

    type Seen = Vec<String>;

    fn task(id: &str, task_type: &str) -> InMemoryTask {
        Task::from_vertex(&Vertex::new(id, task_type, json!({})), Utc::now()).to_in_memory()
    }

    fn recorder(label: &'static str) -> impl Evaluator<(), Seen> {
        evaluator_fn(move |task, _event: &(), seen: &mut Seen| {
            seen.push(format!("{label}:{}", task.id));
            Ok(Vec::new())
        })
    }

    #[test]
    fn dispatches_by_task_type() {
        let registry = EvaluatorRegistry::new()
            .with("build", recorder("build"))
            .unwrap()
            .with("test", recorder("test"))
            .unwrap();

        let mut seen = Seen::new();
        registry.evaluate(&task("b1", "build"), &(), &mut seen).unwrap();
        registry.evaluate(&task("t1", "test"), &(), &mut seen).unwrap();
        assert_eq!(seen, vec!["build:b1", "test:t1"]);
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = EvaluatorRegistry::new();
        registry.register("build", recorder("a")).unwrap();

        let err = registry.register("build", recorder("b")).unwrap_err();
        assert!(matches!(err, RegistryError::AlreadyRegistered(t) if t == "build"));
    }

    #[test]
    fn unknown_types_use_fallback_or_nothing() {
        let mut seen = Seen::new();

        let bare: EvaluatorRegistry<(), Seen> = EvaluatorRegistry::new();
        let actions = bare.evaluate(&task("x", "mystery"), &(), &mut seen).unwrap();
        assert!(actions.is_empty());
        assert!(seen.is_empty());

        let with_fallback = EvaluatorRegistry::new().with_fallback(recorder("fallback"));
        with_fallback
            .evaluate(&task("x", "mystery"), &(), &mut seen)
            .unwrap();
        assert_eq!(seen, vec!["fallback:x"]);
    }

    #[test]
    fn registered_types_are_sorted() {
        let registry = EvaluatorRegistry::new()
            .with("test", recorder("t"))
            .unwrap()
            .with("build", recorder("b"))
            .unwrap();
        assert_eq!(registry.registered_types(), vec!["build", "test"]);
        assert!(registry.get("build").is_some());
        assert!(registry.get("compare").is_none());
    }
}
