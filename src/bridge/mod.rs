//! # Puente al Main Thread
//! src/bridge/mod.rs
//!
//! Despacho de operaciones desde los threads de conexión hacia el único
//! thread que puede tocar el host.
//!
//! ```text
//!  thread de conexión                         main thread
//!  ──────────────────                         ───────────
//!  BridgeClient::submit_and_wait ──▶ TaskQueue ──▶ Pump::tick(&mut host)
//!            ▲                                          │
//!            └──────────── Ticket ◀── Completer ◀───────┘
//! ```
//!
//! - `Bridge::new` crea la cola y devuelve el `Pump`, que es el único
//!   dueño del lado consumidor.
//! - Cada módulo recibe su propio `BridgeClient`, que etiqueta los tasks
//!   con el nombre del módulo para atribuir errores.

pub mod channel;
pub mod pump;
pub mod queue;
pub mod task;

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::error::{BridgeError, OperationError};
use crate::runtime::Wakeup;

pub use channel::{Outcome, Ticket};
pub use pump::{Pump, PumpConfig, PumpStats, PumpStatsSnapshot, TickReport};
pub use queue::{QueueStats, TaskQueue};
pub use task::{Priority, PriorityBand, Task, TaskId, TaskMeta, TaskState};

/// Parámetros del puente (derivados de `Config`)
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub queue_capacity: usize,
    pub starvation_age: Duration,
    pub max_tasks_per_tick: usize,
    pub tick_budget: Duration,
    pub default_timeout: Duration,
    pub max_timeout: Duration,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            starvation_age: Duration::from_millis(2000),
            max_tasks_per_tick: 32,
            tick_budget: Duration::from_millis(12),
            default_timeout: Duration::from_millis(10_000),
            max_timeout: Duration::from_millis(60_000),
        }
    }
}

/// Lado productor del puente, compartido entre threads
pub struct Bridge<H> {
    queue: TaskQueue<H>,
    stats: Arc<PumpStats>,
    settings: BridgeSettings,
}

impl<H: 'static> Bridge<H> {
    /// Crea el puente y el pump que lo consume
    pub fn new(settings: &BridgeSettings) -> (Self, Pump<H>) {
        let queue = TaskQueue::new(
            settings.queue_capacity,
            settings.starvation_age,
            Wakeup::new(),
        );
        let stats = Arc::new(PumpStats::default());
        let pump = Pump::new(
            queue.clone(),
            PumpConfig {
                max_tasks_per_tick: settings.max_tasks_per_tick,
                tick_budget: settings.tick_budget,
            },
            Arc::clone(&stats),
        );

        let bridge = Self {
            queue,
            stats,
            settings: settings.clone(),
        };
        (bridge, pump)
    }

    /// Cliente que etiqueta sus tasks con `module`
    pub fn client(&self, module: &str) -> BridgeClient<H> {
        BridgeClient {
            module: Arc::from(module),
            queue: self.queue.clone(),
            default_timeout: self.settings.default_timeout,
            max_timeout: self.settings.max_timeout,
        }
    }

    pub fn queue(&self) -> &TaskQueue<H> {
        &self.queue
    }

    pub fn wakeup(&self) -> Wakeup {
        self.queue.wakeup().clone()
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    /// Rechaza envíos nuevos. Lo pendiente sigue disponible para el pump.
    pub fn close(&self) {
        self.queue.close();
    }
}

impl<H> Clone for Bridge<H> {
    fn clone(&self) -> Self {
        Self {
            queue: self.queue.clone(),
            stats: Arc::clone(&self.stats),
            settings: self.settings.clone(),
        }
    }
}

/// Vista de solo lectura del puente, sin depender del tipo de host
pub trait BridgeMonitor: Send + Sync {
    fn queue_stats(&self) -> QueueStats;
    fn pump_stats(&self) -> PumpStatsSnapshot;
}

impl<H: 'static> BridgeMonitor for Bridge<H> {
    fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    fn pump_stats(&self) -> PumpStatsSnapshot {
        self.stats.snapshot()
    }
}

/// API de envío que usan los handlers
pub struct BridgeClient<H> {
    module: Arc<str>,
    queue: TaskQueue<H>,
    default_timeout: Duration,
    max_timeout: Duration,
}

impl<H> Clone for BridgeClient<H> {
    fn clone(&self) -> Self {
        Self {
            module: Arc::clone(&self.module),
            queue: self.queue.clone(),
            default_timeout: self.default_timeout,
            max_timeout: self.max_timeout,
        }
    }
}

impl<H: 'static> BridgeClient<H> {
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Limita un timeout pedido por el cliente a `max_timeout`
    pub fn clamp_timeout(&self, requested: Duration) -> Duration {
        requested.min(self.max_timeout)
    }

    /// Encola una operación y devuelve el ticket para esperar su resultado
    pub fn submit<T, F>(
        &self,
        operation: &str,
        priority: Priority,
        op: F,
    ) -> Result<Ticket<T>, BridgeError>
    where
        T: Clone + Send + 'static,
        F: FnOnce(&mut H) -> Result<T, OperationError> + Send + 'static,
    {
        let (task, ticket) = Task::new(&self.module, operation, priority, None, op);
        self.queue.enqueue(task)?;
        Ok(ticket)
    }

    /// Encola una operación y bloquea hasta su resultado o el timeout
    ///
    /// En timeout el task no se retira: puede ejecutarse después y su
    /// resultado se descarta.
    pub fn submit_and_wait<T, F>(
        &self,
        operation: &str,
        priority: Priority,
        timeout: Duration,
        op: F,
    ) -> Result<T, BridgeError>
    where
        T: Clone + Send + 'static,
        F: FnOnce(&mut H) -> Result<T, OperationError> + Send + 'static,
    {
        let timeout = self.clamp_timeout(timeout);
        let (task, ticket) = Task::new(&self.module, operation, priority, Some(timeout), op);
        let task_id = self.queue.enqueue(task)?;

        debug!(
            task_id = %task_id,
            module = %self.module,
            operation,
            timeout_ms = timeout.as_millis() as u64,
            "waiting for main thread"
        );
        ticket.wait_timeout(timeout)
    }

    /// Encola una operación sin esperar el resultado
    pub fn submit_fire_and_forget<T, F>(
        &self,
        operation: &str,
        priority: Priority,
        op: F,
    ) -> Result<TaskId, BridgeError>
    where
        T: Clone + Send + 'static,
        F: FnOnce(&mut H) -> Result<T, OperationError> + Send + 'static,
    {
        let (task, _ticket) = Task::new::<T, F>(&self.module, operation, priority, None, op);
        task.detach();
        self.queue.enqueue(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn settings() -> BridgeSettings {
        BridgeSettings {
            default_timeout: Duration::from_millis(500),
            max_timeout: Duration::from_secs(2),
            ..BridgeSettings::default()
        }
    }

    #[test]
    fn test_submit_and_wait_round_trip() {
        let (bridge, pump) = Bridge::<Vec<u32>>::new(&settings());
        let client = bridge.client("tests");

        let waiter = thread::spawn(move || {
            client.submit_and_wait("push", Priority::NORMAL, Duration::from_secs(2), |host| {
                host.push(1);
                Ok(host.len())
            })
        });

        let mut host = Vec::new();
        while !waiter.is_finished() {
            pump.tick(&mut host);
            thread::sleep(Duration::from_millis(1));
        }

        assert_eq!(waiter.join().unwrap(), Ok(1));
        assert_eq!(host, vec![1]);
    }

    #[test]
    fn test_timeout_leaves_task_queued() {
        let (bridge, pump) = Bridge::<Vec<u32>>::new(&settings());
        let client = bridge.client("tests");

        let result = client.submit_and_wait("slow", Priority::NORMAL, Duration::from_millis(20), |host| {
            host.push(9);
            Ok(())
        });
        match result {
            Err(BridgeError::Timeout { task_id, .. }) => assert!(bridge.queue().contains(task_id)),
            other => panic!("unexpected result: {:?}", other),
        }

        // Se ejecuta igual más tarde y queda como huérfano
        let mut host = Vec::new();
        let report = pump.tick(&mut host);
        assert_eq!(host, vec![9]);
        assert_eq!(report.orphaned, 1);
        assert_eq!(bridge.pump_stats().orphaned, 1);
    }

    #[test]
    fn test_fire_and_forget() {
        let (bridge, pump) = Bridge::<Vec<u32>>::new(&settings());
        let client = bridge.client("tests");

        let id = client
            .submit_fire_and_forget("detached", Priority::LOW, |host: &mut Vec<u32>| {
                host.push(3);
                Ok(())
            })
            .unwrap();
        assert!(bridge.queue().contains(id));

        let mut host = Vec::new();
        let report = pump.tick(&mut host);
        assert_eq!(report.completed, 1);
        assert_eq!(report.orphaned, 0);
        assert_eq!(host, vec![3]);
    }

    #[test]
    fn test_clamp_timeout() {
        let (bridge, _pump) = Bridge::<()>::new(&settings());
        let client = bridge.client("tests");

        assert_eq!(client.clamp_timeout(Duration::from_secs(60)), Duration::from_secs(2));
        assert_eq!(client.clamp_timeout(Duration::from_millis(100)), Duration::from_millis(100));
        assert_eq!(client.default_timeout(), Duration::from_millis(500));
        assert_eq!(client.module(), "tests");
    }

    #[test]
    fn test_closed_bridge_rejects_submissions() {
        let (bridge, _pump) = Bridge::<()>::new(&settings());
        let client = bridge.client("tests");
        bridge.close();

        let result = client.submit("late", Priority::NORMAL, |_| Ok(()));
        assert!(matches!(result, Err(BridgeError::Closed)));
    }

    #[test]
    fn test_monitor_reports_queue() {
        let (bridge, _pump) = Bridge::<()>::new(&settings());
        let client = bridge.client("tests");
        let _ticket = client.submit("pending", Priority::HIGH, |_| Ok(1)).unwrap();

        let monitor: Arc<dyn BridgeMonitor> = Arc::new(bridge.clone());
        let stats = monitor.queue_stats();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.high, 1);
        assert_eq!(monitor.pump_stats().executed, 0);
    }
}
