//! Evaluator combinators.
//!
//! 小さな Evaluator を組み合わせて大きな Evaluator を作るための部品です。
//! `SequenceEvaluator` / `FilteringEvaluator` は任意のイベント・アキュムレータ型で使えます。
//! `DispatchByEventType` は `Event` 専用、payload を持ち上げる系
//! (`PayloadLiftingEvaluator`, `Selector`) は JSON アキュムレータ専用です。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::evaluator::{Actions, Evaluator};
use crate::domain::{EngineError, Event, InMemoryTask, TaskType};

/// Accumulator keyed by task id, as filled by the lifting evaluators.
pub type JsonAccumulator = Map<String, Value>;

type Predicate<E, A> = Box<dyn Fn(&InMemoryTask, &E, &A) -> bool + Send + Sync>;

/// Run several evaluators on the same task, concatenating their actions in
/// order.
pub struct SequenceEvaluator<E, A> {
    evaluators: Vec<Arc<dyn Evaluator<E, A>>>,
}

impl<E, A> SequenceEvaluator<E, A> {
    pub fn new() -> Self {
        Self {
            evaluators: Vec::new(),
        }
    }

    pub fn then(mut self, evaluator: impl Evaluator<E, A> + 'static) -> Self {
        self.evaluators.push(Arc::new(evaluator));
        self
    }
}

impl<E, A> Default for SequenceEvaluator<E, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E, A> Evaluator<E, A> for SequenceEvaluator<E, A> {
    fn evaluate(
        &self,
        task: &InMemoryTask,
        event: &E,
        accumulator: &mut A,
    ) -> Result<Actions<A>, EngineError> {
        let mut actions = Vec::new();
        for evaluator in &self.evaluators {
            actions.extend(evaluator.evaluate(task, event, accumulator)?);
        }
        Ok(actions)
    }
}

/// Delegate only when `predicate` holds, otherwise use the alternative (if
/// any).
pub struct FilteringEvaluator<E, A> {
    predicate: Predicate<E, A>,
    delegate: Arc<dyn Evaluator<E, A>>,
    alternative: Option<Arc<dyn Evaluator<E, A>>>,
}

impl<E, A> FilteringEvaluator<E, A> {
    pub fn new(
        predicate: impl Fn(&InMemoryTask, &E, &A) -> bool + Send + Sync + 'static,
        delegate: impl Evaluator<E, A> + 'static,
    ) -> Self {
        Self {
            predicate: Box::new(predicate),
            delegate: Arc::new(delegate),
            alternative: None,
        }
    }

    pub fn otherwise(mut self, alternative: impl Evaluator<E, A> + 'static) -> Self {
        self.alternative = Some(Arc::new(alternative));
        self
    }
}

impl<E, A> Evaluator<E, A> for FilteringEvaluator<E, A> {
    fn evaluate(
        &self,
        task: &InMemoryTask,
        event: &E,
        accumulator: &mut A,
    ) -> Result<Actions<A>, EngineError> {
        if (self.predicate)(task, event, accumulator) {
            self.delegate.evaluate(task, event, accumulator)
        } else if let Some(alternative) = &self.alternative {
            alternative.evaluate(task, event, accumulator)
        } else {
            Ok(Vec::new())
        }
    }
}

/// Route on `Event::event_type`.
pub struct DispatchByEventType<A> {
    routes: HashMap<String, Arc<dyn Evaluator<Event, A>>>,
    default: Option<Arc<dyn Evaluator<Event, A>>>,
}

impl<A> DispatchByEventType<A> {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            default: None,
        }
    }

    pub fn on(
        mut self,
        event_type: impl Into<String>,
        evaluator: impl Evaluator<Event, A> + 'static,
    ) -> Self {
        self.routes.insert(event_type.into(), Arc::new(evaluator));
        self
    }

    pub fn with_default(mut self, evaluator: impl Evaluator<Event, A> + 'static) -> Self {
        self.default = Some(Arc::new(evaluator));
        self
    }
}

impl<A> Default for DispatchByEventType<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Evaluator<Event, A> for DispatchByEventType<A> {
    fn evaluate(
        &self,
        task: &InMemoryTask,
        event: &Event,
        accumulator: &mut A,
    ) -> Result<Actions<A>, EngineError> {
        match self
            .routes
            .get(&event.event_type)
            .or(self.default.as_ref())
        {
            Some(evaluator) => evaluator.evaluate(task, event, accumulator),
            None => Ok(Vec::new()),
        }
    }
}

/// Copy each task's payload, plus its status under `"status"`, into the
/// accumulator under the task id. Produces no actions.
///
/// Non-object payloads are stored under `"payload"`.
#[derive(Debug, Clone, Default)]
pub struct PayloadLiftingEvaluator {
    exclude_keys: HashSet<String>,
    exclude_event_types: HashSet<String>,
}

impl PayloadLiftingEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exclude_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_keys.extend(keys.into_iter().map(Into::into));
        self
    }

    pub fn exclude_event_types<I, S>(mut self, event_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_event_types
            .extend(event_types.into_iter().map(Into::into));
        self
    }

    fn lift(&self, task: &InMemoryTask, accumulator: &mut JsonAccumulator) {
        let mut lifted = match &task.payload {
            Value::Object(fields) => fields
                .iter()
                .filter(|(key, _)| !self.exclude_keys.contains(key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            Value::Null => Map::new(),
            other => {
                let mut fields = Map::new();
                fields.insert("payload".to_string(), other.clone());
                fields
            }
        };
        lifted.insert(
            "status".to_string(),
            Value::String(task.status.as_str().to_string()),
        );
        accumulator.insert(task.id.to_string(), Value::Object(lifted));
    }
}

impl Evaluator<Event, JsonAccumulator> for PayloadLiftingEvaluator {
    fn evaluate(
        &self,
        task: &InMemoryTask,
        event: &Event,
        accumulator: &mut JsonAccumulator,
    ) -> Result<Actions<JsonAccumulator>, EngineError> {
        if !self.exclude_event_types.contains(&event.event_type) {
            self.lift(task, accumulator);
        }
        Ok(Vec::new())
    }
}

/// Lift the payloads of tasks that match any configured criterion.
///
/// A task is selected when its type equals `task_type`, OR the event type
/// equals `event_type`, OR `predicate` holds. With no criteria nothing is
/// selected.
pub struct Selector {
    task_type: Option<TaskType>,
    event_type: Option<String>,
    predicate: Option<Predicate<Event, JsonAccumulator>>,
    lifting: PayloadLiftingEvaluator,
}

impl Selector {
    pub fn new() -> Self {
        Self {
            task_type: None,
            event_type: None,
            predicate: None,
            lifting: PayloadLiftingEvaluator::new(),
        }
    }

    pub fn task_type(mut self, task_type: impl Into<TaskType>) -> Self {
        self.task_type = Some(task_type.into());
        self
    }

    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    pub fn predicate(
        mut self,
        predicate: impl Fn(&InMemoryTask, &Event, &JsonAccumulator) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.predicate = Some(Box::new(predicate));
        self
    }

    pub fn lifting(mut self, lifting: PayloadLiftingEvaluator) -> Self {
        self.lifting = lifting;
        self
    }

    fn matches(&self, task: &InMemoryTask, event: &Event, accumulator: &JsonAccumulator) -> bool {
        self.task_type.as_ref().is_some_and(|t| *t == task.task_type)
            || self.event_type.as_ref().is_some_and(|e| *e == event.event_type)
            || self
                .predicate
                .as_ref()
                .is_some_and(|p| p(task, event, accumulator))
    }
}

impl Default for Selector {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator<Event, JsonAccumulator> for Selector {
    fn evaluate(
        &self,
        task: &InMemoryTask,
        event: &Event,
        accumulator: &mut JsonAccumulator,
    ) -> Result<Actions<JsonAccumulator>, EngineError> {
        if self.matches(task, event, accumulator) {
            self.lifting.evaluate(task, event, accumulator)
        } else {
            Ok(Vec::new())
        }
    }
}
