//! # Tasks del Puente
//! src/bridge/task.rs
//!
//! Un `Task` es una operación empaquetada para ejecutarse en el main thread.
//! Lo crea el thread de la conexión, viaja por la `TaskQueue` y solo el
//! `Pump` lo ejecuta, pasándole `&mut H` (el host).
//!
//! ## Ciclo de vida
//!
//! ```text
//! created → queued → executing → completed | failed
//!                 └─ abandoned (marca ortogonal, la pone el waiter en timeout)
//! ```

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};
use ulid::Ulid;

use super::channel::{self, Ticket};
use crate::error::{FailureReason, OperationError, TaskExecutionError};

/// Identificador único de un task dentro del proceso
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(Ulid);

impl TaskId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Prioridad de un task: entero, mayor valor se drena primero
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Priority(i32);

/// Banda de prioridad, usada solo para estadísticas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityBand {
    Low,
    Normal,
    High,
}

impl Priority {
    pub const LOW: Priority = Priority(0);
    pub const NORMAL: Priority = Priority(50);
    pub const HIGH: Priority = Priority(100);

    pub fn new(value: i32) -> Self {
        Self(value)
    }

    pub fn value(&self) -> i32 {
        self.0
    }

    /// Acepta `low`, `normal`, `high` o un entero
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Priority::LOW),
            "normal" => Some(Priority::NORMAL),
            "high" => Some(Priority::HIGH),
            other => other.parse::<i32>().ok().map(Priority),
        }
    }

    pub fn band(&self) -> PriorityBand {
        match self.0.cmp(&Priority::NORMAL.0) {
            std::cmp::Ordering::Less => PriorityBand::Low,
            std::cmp::Ordering::Equal => PriorityBand::Normal,
            std::cmp::Ordering::Greater => PriorityBand::High,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::NORMAL
    }
}

/// Estado de ejecución de un task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum TaskState {
    /// Creado por el thread de la conexión, aún no encolado
    Created = 0,

    /// En la cola, esperando al pump
    Queued = 1,

    /// El pump lo está ejecutando
    Executing = 2,

    /// Terminó con éxito
    Completed = 3,

    /// Terminó con error, panic o nunca se ejecutó
    Failed = 4,
}

impl TaskState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => TaskState::Created,
            1 => TaskState::Queued,
            2 => TaskState::Executing,
            3 => TaskState::Completed,
            _ => TaskState::Failed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::Created => "created",
            TaskState::Queued => "queued",
            TaskState::Executing => "executing",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Completed | TaskState::Failed)
    }
}

/// Estado compartido entre el task, su ticket y su completer
#[derive(Debug)]
pub(crate) struct StatusCell {
    state: AtomicU8,
    abandoned: AtomicBool,
    detached: AtomicBool,
}

impl StatusCell {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(TaskState::Created as u8),
            abandoned: AtomicBool::new(false),
            detached: AtomicBool::new(false),
        }
    }

    pub(crate) fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set_state(&self, state: TaskState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub(crate) fn mark_abandoned(&self) {
        self.abandoned.store(true, Ordering::Release);
    }

    pub(crate) fn is_abandoned(&self) -> bool {
        self.abandoned.load(Ordering::Acquire)
    }

    pub(crate) fn mark_detached(&self) {
        self.detached.store(true, Ordering::Release);
    }

    pub(crate) fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }
}

/// Metadatos de un task, visibles para logs y errores
#[derive(Debug, Clone)]
pub struct TaskMeta {
    pub id: TaskId,

    /// Módulo que envió el task (contexto para atribuir errores)
    pub module: String,

    /// Nombre de la operación (ej: "create_document")
    pub operation: String,

    pub priority: Priority,

    /// Momento en que entró a la cola
    pub enqueued_at: Instant,

    /// Momento a partir del cual el waiter ya no espera
    pub deadline: Option<Instant>,
}

impl TaskMeta {
    /// Envuelve un motivo de falla con el contexto de este task
    pub fn failure(&self, reason: FailureReason) -> TaskExecutionError {
        TaskExecutionError {
            task_id: self.id,
            module: self.module.clone(),
            operation: self.operation.clone(),
            reason,
        }
    }
}

type Runner<H> = Box<dyn FnOnce(&mut H, &TaskMeta) -> Result<(), TaskExecutionError> + Send>;

/// Operación pendiente de ejecutarse en el main thread
pub struct Task<H> {
    meta: TaskMeta,
    timeout: Option<Duration>,
    status: Arc<StatusCell>,
    runner: Runner<H>,
}

/// Lo que el pump observa al ejecutar un task
#[derive(Debug)]
pub struct TaskReport {
    pub meta: TaskMeta,
    pub outcome: Result<(), TaskExecutionError>,
    pub elapsed: Duration,

    /// El waiter se rindió antes de que terminara
    pub abandoned: bool,

    /// Se envió como fire-and-forget
    pub detached: bool,

    /// Cuánto después del deadline empezó a ejecutarse
    pub late_by: Option<Duration>,
}

impl<H: 'static> Task<H> {
    /// Crea un task y el ticket con el que se espera su resultado
    ///
    /// La operación recibe el host por `&mut`; errores y panics quedan
    /// capturados y viajan por el result channel.
    pub fn new<T, F>(
        module: &str,
        operation: &str,
        priority: Priority,
        timeout: Option<Duration>,
        op: F,
    ) -> (Task<H>, Ticket<T>)
    where
        T: Clone + Send + 'static,
        F: FnOnce(&mut H) -> Result<T, OperationError> + Send + 'static,
    {
        let meta = TaskMeta {
            id: TaskId::new(),
            module: module.to_string(),
            operation: operation.to_string(),
            priority,
            enqueued_at: Instant::now(),
            deadline: None,
        };
        let status = Arc::new(StatusCell::new());
        let (completer, ticket) = channel::pair::<T>(
            Arc::clone(&status),
            meta.failure(FailureReason::NotExecuted),
        );

        let runner: Runner<H> = Box::new(move |host: &mut H, meta: &TaskMeta| {
            let outcome = match catch_unwind(AssertUnwindSafe(|| op(host))) {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(meta.failure(FailureReason::Operation(err))),
                Err(payload) => Err(meta.failure(FailureReason::Panicked(panic_message(payload)))),
            };
            let summary = match &outcome {
                Ok(_) => Ok(()),
                Err(err) => Err(err.clone()),
            };
            completer.complete(outcome);
            summary
        });

        let task = Task {
            meta,
            timeout,
            status,
            runner,
        };
        (task, ticket)
    }
}

impl<H> Task<H> {
    pub fn id(&self) -> TaskId {
        self.meta.id
    }

    pub fn meta(&self) -> &TaskMeta {
        &self.meta
    }

    pub fn state(&self) -> TaskState {
        self.status.state()
    }

    /// Marca el task como fire-and-forget: nadie leerá su resultado
    pub(crate) fn detach(&self) {
        self.status.mark_detached();
    }

    /// Llamado por la cola al aceptar el task
    pub(crate) fn mark_queued(&mut self, now: Instant) {
        self.meta.enqueued_at = now;
        self.meta.deadline = self.timeout.map(|timeout| now + timeout);
        self.status.set_state(TaskState::Queued);
    }

    /// Ejecuta la operación sobre el host. Solo lo llama el pump.
    pub(crate) fn execute(self, host: &mut H) -> TaskReport {
        self.status.set_state(TaskState::Executing);
        let started = Instant::now();
        let late_by = self
            .meta
            .deadline
            .and_then(|deadline| started.checked_duration_since(deadline));

        let outcome = (self.runner)(host, &self.meta);

        TaskReport {
            outcome,
            elapsed: started.elapsed(),
            abandoned: self.status.is_abandoned(),
            detached: self.status.is_detached(),
            late_by,
            meta: self.meta,
        }
    }
}

impl<H> fmt::Debug for Task<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("meta", &self.meta)
            .field("state", &self.status.state())
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
