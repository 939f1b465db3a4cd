//! InMemoryTaskStore - 開発用・テスト用の TaskStore
//!
//! 楽観的並行性制御（OCC）でトランザクションを実現します。
//! - 各キー（job / task）にバージョンを持たせる
//! - トランザクションは読んだキーのバージョン（存在しなかったことも含む）を記録する
//! - ジョブ単位の範囲クエリは「メンバーシップ」バージョンを記録する（phantom 対策）
//! - commit 時にロックを取り、記録したバージョンが変わっていれば `StoreError::Conflict`
//!
//! 書き込みは commit までトランザクション内にバッファされます。

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{JobId, JobRecord, Task, TaskId, TaskLog};
use crate::ports::{
    Clock, IdGenerator, StoreError, SystemClock, TaskStore, Transaction, UlidGenerator,
};

type TaskKey = (JobId, TaskId);

#[derive(Debug, Clone)]
struct Versioned<T> {
    version: u64,
    value: T,
}

/// What a transaction observed, used for validation at commit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ReadKey {
    Job(JobId),
    Task(JobId, TaskId),
    /// The set of task ids under a job.
    Membership(JobId),
}

/// Committed state (single source of truth).
#[derive(Default)]
struct StoreState {
    next_version: u64,
    jobs: HashMap<JobId, Versioned<JobRecord>>,
    tasks: BTreeMap<TaskKey, Versioned<Task>>,
    memberships: HashMap<JobId, u64>,
    logs: HashMap<TaskKey, Vec<TaskLog>>,
}

impl StoreState {
    fn bump(&mut self) -> u64 {
        self.next_version += 1;
        self.next_version
    }

    fn current_version(&self, key: &ReadKey) -> Option<u64> {
        match key {
            ReadKey::Job(job_id) => self.jobs.get(job_id).map(|v| v.version),
            ReadKey::Task(job_id, task_id) => self
                .tasks
                .get(&(*job_id, task_id.clone()))
                .map(|v| v.version),
            ReadKey::Membership(job_id) => self.memberships.get(job_id).copied(),
        }
    }

    fn tasks_of(&self, job_id: &JobId) -> impl Iterator<Item = (&TaskKey, &Versioned<Task>)> {
        self.tasks
            .range((*job_id, TaskId::new(""))..)
            .take_while(move |((owner, _), _)| owner == job_id)
    }
}

/// In-memory TaskStore.
///
/// Cloning is cheap; clones share the same underlying state.
#[derive(Clone)]
pub struct InMemoryTaskStore {
    state: Arc<Mutex<StoreState>>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let ids = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            clock,
            ids,
        }
    }

    /// Register a new job and return its id.
    pub async fn create_job(&self) -> Result<JobId, StoreError> {
        let job = JobRecord::new(self.ids.generate_job_id(), self.clock.now());
        let job_id = job.job_id;
        let mut tx = self.begin().await?;
        tx.put_job(job).await?;
        tx.commit().await?;
        Ok(job_id)
    }

    /// Number of committed tasks under `job_id` (for tests and status output).
    pub async fn task_count(&self, job_id: &JobId) -> usize {
        let state = self.state.lock().await;
        state.tasks_of(job_id).count()
    }
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        Ok(Box::new(InMemoryTransaction {
            state: Arc::clone(&self.state),
            reads: HashMap::new(),
            job_writes: HashMap::new(),
            task_writes: BTreeMap::new(),
            log_writes: Vec::new(),
        }))
    }
}

/// Transaction implementation for InMemoryTaskStore.
pub struct InMemoryTransaction {
    state: Arc<Mutex<StoreState>>,
    reads: HashMap<ReadKey, Option<u64>>,
    job_writes: HashMap<JobId, JobRecord>,
    task_writes: BTreeMap<TaskKey, Task>,
    log_writes: Vec<(TaskKey, TaskLog)>,
}

impl InMemoryTransaction {
    /// Keep the first observed version: that is what our decisions were based on.
    fn record_read(&mut self, key: ReadKey, version: Option<u64>) {
        self.reads.entry(key).or_insert(version);
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn job_exists(&mut self, job_id: &JobId) -> Result<bool, StoreError> {
        if self.job_writes.contains_key(job_id) {
            return Ok(true);
        }
        let version = {
            let state = self.state.lock().await;
            state.current_version(&ReadKey::Job(*job_id))
        };
        self.record_read(ReadKey::Job(*job_id), version);
        Ok(version.is_some())
    }

    async fn put_job(&mut self, job: JobRecord) -> Result<(), StoreError> {
        self.job_writes.insert(job.job_id, job);
        Ok(())
    }

    async fn get_task(
        &mut self,
        job_id: &JobId,
        task_id: &TaskId,
    ) -> Result<Option<Task>, StoreError> {
        let key = (*job_id, task_id.clone());
        if let Some(task) = self.task_writes.get(&key) {
            return Ok(Some(task.clone()));
        }
        let found = {
            let state = self.state.lock().await;
            state
                .tasks
                .get(&key)
                .map(|v| (v.version, v.value.clone()))
        };
        self.record_read(
            ReadKey::Task(*job_id, task_id.clone()),
            found.as_ref().map(|(version, _)| *version),
        );
        Ok(found.map(|(_, task)| task))
    }

    async fn query_tasks(&mut self, job_id: &JobId) -> Result<Vec<Task>, StoreError> {
        let (membership, committed) = {
            let state = self.state.lock().await;
            let membership = state.current_version(&ReadKey::Membership(*job_id));
            let committed: Vec<(u64, Task)> = state
                .tasks_of(job_id)
                .map(|(_, v)| (v.version, v.value.clone()))
                .collect();
            (membership, committed)
        };

        self.record_read(ReadKey::Membership(*job_id), membership);
        let mut merged: BTreeMap<TaskId, Task> = BTreeMap::new();
        for (version, task) in committed {
            self.record_read(ReadKey::Task(*job_id, task.id.clone()), Some(version));
            merged.insert(task.id.clone(), task);
        }
        for ((owner, task_id), task) in &self.task_writes {
            if owner == job_id {
                merged.insert(task_id.clone(), task.clone());
            }
        }
        Ok(merged.into_values().collect())
    }

    async fn put_tasks(&mut self, job_id: &JobId, tasks: Vec<Task>) -> Result<(), StoreError> {
        for task in tasks {
            self.task_writes.insert((*job_id, task.id.clone()), task);
        }
        Ok(())
    }

    async fn append_log(
        &mut self,
        job_id: &JobId,
        task_id: &TaskId,
        log: TaskLog,
    ) -> Result<(), StoreError> {
        self.log_writes.push(((*job_id, task_id.clone()), log));
        Ok(())
    }

    async fn query_logs(
        &mut self,
        job_id: &JobId,
        task_id: &TaskId,
    ) -> Result<Vec<TaskLog>, StoreError> {
        let key = (*job_id, task_id.clone());
        let mut logs = {
            let state = self.state.lock().await;
            state.logs.get(&key).cloned().unwrap_or_default()
        };
        logs.extend(
            self.log_writes
                .iter()
                .filter(|(k, _)| *k == key)
                .map(|(_, log)| log.clone()),
        );
        Ok(logs)
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let this = *self;
        let mut state = this.state.lock().await;

        for (key, seen) in &this.reads {
            if state.current_version(key) != *seen {
                return Err(StoreError::Conflict(format!("{key:?} changed since read")));
            }
        }

        for (job_id, job) in this.job_writes {
            let version = state.bump();
            state.jobs.insert(job_id, Versioned { version, value: job });
        }
        for (key, task) in this.task_writes {
            let version = state.bump();
            if !state.tasks.contains_key(&key) {
                let membership = state.bump();
                state.memberships.insert(key.0, membership);
            }
            state.tasks.insert(key, Versioned { version, value: task });
        }
        for (key, log) in this.log_writes {
            state.logs.entry(key).or_default().push(log);
        }
        Ok(())
    }
}
