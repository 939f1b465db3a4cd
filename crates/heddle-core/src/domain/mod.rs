//! Domain model (IDs, statuses, graph vocabulary, records, errors).

pub mod errors;
pub mod event;
pub mod graph;
pub mod ids;
pub mod status;
pub mod task;
pub mod task_type;

pub use self::errors::{EngineError, ErrorKind, TransitionError};
pub use self::event::Event;
pub use self::graph::{Dependency, TaskGraph, Vertex};
pub use self::ids::{JobId, TaskId, TaskLogId};
pub use self::status::TaskStatus;
pub use self::task::{InMemoryTask, JobRecord, Task, TaskLog};
pub use self::task_type::TaskType;
