//! # Cola de Tasks
//! src/bridge/queue.rs
//!
//! Cola thread-safe multi-productor (threads de conexión) y un solo
//! consumidor (el pump en el main thread).
//!
//! Orden de salida de `drain`:
//! 1. Prioridad descendente. Un task más viejo que `starvation_age` sube
//!    al tier más alto para ese drain.
//! 2. `enqueued_at` ascendente (FIFO)
//! 3. Número de secuencia ascendente (desempate estable)
//!
//! Un task sale de la cola una sola vez: `drain` lo mueve al pump.
//!
//! `enqueued_at` se toma bajo el lock, así que crece con el número de
//! secuencia. Los tasks viven en un `BTreeMap` por secuencia (el primero es
//! el más viejo) y un `BinaryHeap` de `(prioridad, secuencia)` da el orden
//! normal. Cada pop es logarítmico; la promoción se decide al sacar.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

use super::task::{PriorityBand, Task, TaskId};
use crate::error::BridgeError;
use crate::runtime::Wakeup;

struct QueueState<H> {
    /// Tasks pendientes por número de secuencia
    pending: BTreeMap<u64, Task<H>>,

    /// Puede tener secuencias ya sacadas por promoción; se descartan al
    /// llegar al tope
    by_priority: BinaryHeap<(i32, Reverse<u64>)>,
    next_seq: u64,
    closed: bool,
    total_enqueued: u64,
}

impl<H> QueueState<H> {
    fn pop_next(&mut self, now: Instant, starvation_age: Duration) -> Option<Task<H>> {
        let starved = self
            .pending
            .first_key_value()
            .filter(|(_, task)| now.saturating_duration_since(task.meta().enqueued_at) >= starvation_age)
            .map(|(&seq, _)| seq);
        if let Some(seq) = starved {
            return self.pending.remove(&seq);
        }

        while let Some((_, Reverse(seq))) = self.by_priority.pop() {
            if let Some(task) = self.pending.remove(&seq) {
                return Some(task);
            }
        }
        None
    }
}

/// Cola de tasks pendientes
pub struct TaskQueue<H> {
    inner: Arc<Mutex<QueueState<H>>>,

    /// Se notifica en cada enqueue para despertar al main loop
    wakeup: Wakeup,

    /// Capacidad máxima (backpressure)
    max_capacity: usize,

    starvation_age: Duration,
}

impl<H> TaskQueue<H> {
    /// Crea una cola vacía
    pub fn new(max_capacity: usize, starvation_age: Duration, wakeup: Wakeup) -> Self {
        Self {
            inner: Arc::new(Mutex::new(QueueState {
                pending: BTreeMap::new(),
                by_priority: BinaryHeap::new(),
                next_seq: 0,
                closed: false,
                total_enqueued: 0,
            })),
            wakeup,
            max_capacity,
            starvation_age,
        }
    }

    // Un task que hace panic no debe dejar la cola inutilizable
    fn lock(&self) -> MutexGuard<'_, QueueState<H>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Encola un task
    ///
    /// Falla si la cola está llena o cerrada. En ese caso el task se
    /// destruye y su ticket recibe `NotExecuted`.
    pub fn enqueue(&self, mut task: Task<H>) -> Result<TaskId, BridgeError> {
        let id = task.id();
        {
            let mut state = self.lock();

            if state.closed {
                return Err(BridgeError::Closed);
            }
            if state.pending.len() >= self.max_capacity {
                return Err(BridgeError::QueueFull {
                    capacity: self.max_capacity,
                });
            }

            task.mark_queued(Instant::now());
            let seq = state.next_seq;
            state.next_seq += 1;
            state.total_enqueued += 1;
            state.by_priority.push((task.meta().priority.value(), Reverse(seq)));
            state.pending.insert(seq, task);
        }

        self.wakeup.notify();
        Ok(id)
    }

    /// Saca todos los tasks listos, en orden de ejecución
    pub fn drain(&self) -> Vec<Task<H>> {
        self.drain_up_to(usize::MAX)
    }

    /// Saca como máximo `limit` tasks, en orden de ejecución
    pub fn drain_up_to(&self, limit: usize) -> Vec<Task<H>> {
        if limit == 0 {
            return Vec::new();
        }

        let now = Instant::now();
        let mut state = self.lock();

        let take = limit.min(state.pending.len());
        let mut drained = Vec::with_capacity(take);
        while drained.len() < take {
            match state.pop_next(now, self.starvation_age) {
                Some(task) => drained.push(task),
                None => break,
            }
        }
        if state.pending.is_empty() {
            state.by_priority.clear();
        } else if state.by_priority.len() > 2 * state.pending.len() {
            let rebuilt: BinaryHeap<_> = state
                .pending
                .iter()
                .map(|(&seq, task)| (task.meta().priority.value(), Reverse(seq)))
                .collect();
            state.by_priority = rebuilt;
        }

        drained
    }

    /// Retorna el tamaño actual de la cola
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Verifica si la cola está vacía
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retorna la capacidad máxima
    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Verifica si la cola está llena
    pub fn is_full(&self) -> bool {
        self.len() >= self.max_capacity
    }

    /// Verifica si un task sigue pendiente (sin removerlo)
    pub fn contains(&self, id: TaskId) -> bool {
        self.lock().pending.values().any(|task| task.id() == id)
    }

    /// Cierra la cola: nuevos enqueue fallan con `BridgeError::Closed`.
    /// Lo pendiente se puede seguir drenando.
    pub fn close(&self) {
        self.lock().closed = true;
        self.wakeup.notify();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn wakeup(&self) -> &Wakeup {
        &self.wakeup
    }

    /// Obtiene estadísticas de la cola
    pub fn stats(&self) -> QueueStats {
        let now = Instant::now();
        let state = self.lock();

        let mut stats = QueueStats {
            pending: state.pending.len(),
            capacity: self.max_capacity,
            high: 0,
            normal: 0,
            low: 0,
            oldest_pending_ms: 0,
            total_enqueued: state.total_enqueued,
            closed: state.closed,
        };

        for task in state.pending.values() {
            let meta = task.meta();
            match meta.priority.band() {
                PriorityBand::High => stats.high += 1,
                PriorityBand::Normal => stats.normal += 1,
                PriorityBand::Low => stats.low += 1,
            }
            let age = now.saturating_duration_since(meta.enqueued_at).as_millis() as u64;
            stats.oldest_pending_ms = stats.oldest_pending_ms.max(age);
        }

        stats
    }
}

/// Estadísticas de la cola
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub capacity: usize,
    pub high: usize,
    pub normal: usize,
    pub low: usize,
    pub oldest_pending_ms: u64,
    pub total_enqueued: u64,
    pub closed: bool,
}

impl<H> Clone for TaskQueue<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            wakeup: self.wakeup.clone(),
            max_capacity: self.max_capacity,
            starvation_age: self.starvation_age,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::task::Priority;
    use crate::bridge::Ticket;
    use crate::error::{FailureReason, OperationError};
    use std::collections::HashSet;
    use std::thread;

    fn queue(capacity: usize) -> TaskQueue<()> {
        TaskQueue::new(capacity, Duration::from_secs(60), Wakeup::new())
    }

    fn task(name: &str, priority: Priority) -> (Task<()>, Ticket<()>) {
        Task::new("tests", name, priority, None, |_: &mut ()| Ok::<_, OperationError>(()))
    }

    fn names(tasks: &[Task<()>]) -> Vec<String> {
        tasks.iter().map(|t| t.meta().operation.clone()).collect()
    }

    #[test]
    fn test_queue_ordering() {
        let queue = queue(100);

        queue.enqueue(task("low", Priority::LOW).0).unwrap();
        queue.enqueue(task("high", Priority::HIGH).0).unwrap();
        queue.enqueue(task("normal", Priority::NORMAL).0).unwrap();
        queue.enqueue(task("high-2", Priority::HIGH).0).unwrap();

        let drained = queue.drain();
        assert_eq!(names(&drained), vec!["high", "high-2", "normal", "low"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_same_priority_is_fifo() {
        let queue = queue(100);
        for i in 0..20 {
            queue.enqueue(task(&format!("t{}", i), Priority::NORMAL).0).unwrap();
        }

        let expected: Vec<String> = (0..20).map(|i| format!("t{}", i)).collect();
        assert_eq!(names(&queue.drain()), expected);
    }

    #[test]
    fn test_starved_task_is_promoted() {
        let queue = TaskQueue::new(100, Duration::from_millis(30), Wakeup::new());

        queue.enqueue(task("old-low", Priority::LOW).0).unwrap();
        thread::sleep(Duration::from_millis(40));
        queue.enqueue(task("fresh-high", Priority::HIGH).0).unwrap();

        assert_eq!(names(&queue.drain()), vec!["old-low", "fresh-high"]);
    }

    #[test]
    fn test_promoted_task_is_drained_once() {
        let queue = TaskQueue::new(100, Duration::from_millis(30), Wakeup::new());

        queue.enqueue(task("old-low", Priority::LOW).0).unwrap();
        queue.enqueue(task("old-normal", Priority::NORMAL).0).unwrap();
        thread::sleep(Duration::from_millis(40));
        queue.enqueue(task("fresh-low", Priority::LOW).0).unwrap();
        queue.enqueue(task("fresh-high", Priority::HIGH).0).unwrap();

        // Los viejos salen primero, en orden de llegada; el resto por prioridad
        assert_eq!(names(&queue.drain_up_to(1)), vec!["old-low"]);
        assert_eq!(
            names(&queue.drain()),
            vec!["old-normal", "fresh-high", "fresh-low"]
        );
        assert!(queue.drain().is_empty());
        assert_eq!(queue.len(), 0);
    }

    #[test]
    fn test_drain_up_to_keeps_rest() {
        let queue = queue(100);
        for i in 0..5 {
            queue.enqueue(task(&format!("t{}", i), Priority::NORMAL).0).unwrap();
        }

        assert_eq!(names(&queue.drain_up_to(2)), vec!["t0", "t1"]);
        assert_eq!(queue.len(), 3);
        assert!(queue.drain_up_to(0).is_empty());
        assert_eq!(names(&queue.drain()), vec!["t2", "t3", "t4"]);
    }

    #[test]
    fn test_queue_capacity() {
        let queue = queue(2);

        assert!(queue.enqueue(task("1", Priority::NORMAL).0).is_ok());
        assert!(queue.enqueue(task("2", Priority::NORMAL).0).is_ok());
        assert!(queue.is_full());

        let (rejected, ticket) = task("3", Priority::NORMAL);
        assert_eq!(
            queue.enqueue(rejected),
            Err(BridgeError::QueueFull { capacity: 2 })
        );
        // El task rechazado nunca se ejecuta
        let outcome = ticket.try_outcome().unwrap();
        assert_eq!(outcome.unwrap_err().reason, FailureReason::NotExecuted);
    }

    #[test]
    fn test_closed_queue_rejects_but_drains() {
        let queue = queue(10);
        let (pending, _ticket) = task("pending", Priority::NORMAL);
        let id = queue.enqueue(pending).unwrap();
        assert!(queue.contains(id));

        queue.close();
        assert!(queue.is_closed());
        assert_eq!(
            queue.enqueue(task("late", Priority::NORMAL).0),
            Err(BridgeError::Closed)
        );
        assert_eq!(names(&queue.drain()), vec!["pending"]);
    }

    #[test]
    fn test_enqueue_notifies_wakeup() {
        let queue = queue(10);
        queue.enqueue(task("t", Priority::NORMAL).0).unwrap();
        assert!(queue.wakeup().wait_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn test_concurrent_enqueue_drains_each_task_once() {
        let queue = queue(1000);
        let mut handles = Vec::new();

        for t in 0..8 {
            let queue = queue.clone();
            handles.push(thread::spawn(move || {
                for i in 0..25 {
                    queue
                        .enqueue(task(&format!("{}-{}", t, i), Priority::NORMAL).0)
                        .unwrap();
                }
            }));
        }

        let mut seen = HashSet::new();
        let mut drained = 0;
        while drained < 200 {
            for task in queue.drain_up_to(7) {
                assert!(seen.insert(task.id()), "task drained twice");
                drained += 1;
            }
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(queue.drain().is_empty());
        assert_eq!(queue.stats().total_enqueued, 200);
    }

    #[test]
    fn test_stats_by_band() {
        let queue = queue(10);
        queue.enqueue(task("a", Priority::HIGH).0).unwrap();
        queue.enqueue(task("b", Priority::new(80)).0).unwrap();
        queue.enqueue(task("c", Priority::LOW).0).unwrap();
        queue.enqueue(task("d", Priority::NORMAL).0).unwrap();

        let stats = queue.stats();
        assert_eq!(stats.pending, 4);
        assert_eq!(stats.capacity, 10);
        assert_eq!(stats.high, 2);
        assert_eq!(stats.normal, 1);
        assert_eq!(stats.low, 1);
        assert!(!stats.closed);
    }
}
