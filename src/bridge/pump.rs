//! # Pump del Main Thread
//! src/bridge/pump.rs
//!
//! Único consumidor de la `TaskQueue`. Cada `tick` drena un lote acotado
//! y lo ejecuta de forma síncrona sobre el host:
//!
//! - Como máximo `max_tasks_per_tick` tasks y `tick_budget` de tiempo
//!   (siempre se ejecuta al menos uno)
//! - Lo drenado que no alcanzó a ejecutarse queda guardado en el pump y
//!   corre primero en el siguiente tick. No vuelve a la cola.
//! - Un task que falla o hace panic no interrumpe a los siguientes
//! - Un `tick` llamado mientras otro está en curso se salta
//!
//! `Pump` no es `Sync` ni se clona: vive en el main thread.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use super::queue::TaskQueue;
use super::task::{Task, TaskReport};

/// Límites de trabajo por tick
#[derive(Debug, Clone, Copy)]
pub struct PumpConfig {
    pub max_tasks_per_tick: usize,
    pub tick_budget: Duration,
}

impl Default for PumpConfig {
    fn default() -> Self {
        Self {
            max_tasks_per_tick: 32,
            tick_budget: Duration::from_millis(12),
        }
    }
}

/// Resultado de un tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// El tick se saltó por reentrada
    pub skipped: bool,
    pub executed: usize,
    pub completed: usize,
    pub failed: usize,

    /// Tasks terminados cuyo waiter ya se había rendido
    pub orphaned: usize,

    /// Tasks que quedaron guardados para el siguiente tick
    pub carried: usize,
    pub elapsed: Duration,
}

/// Contadores acumulados del pump, legibles desde cualquier thread
#[derive(Debug, Default)]
pub struct PumpStats {
    ticks: AtomicU64,
    skipped: AtomicU64,
    executed: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    orphaned: AtomicU64,
    carried: AtomicU64,

    /// Tasks guardados en el pump ahora mismo
    waiting: AtomicU64,
}

/// Copia serializable de `PumpStats`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PumpStatsSnapshot {
    pub ticks: u64,
    pub skipped_ticks: u64,
    pub executed: u64,
    pub completed: u64,
    pub failed: u64,
    pub orphaned: u64,
    pub carried: u64,

    /// Drenados de la cola que esperan al siguiente tick. No cuentan en
    /// `QueueStats::pending`.
    pub waiting: u64,
}

impl PumpStats {
    pub fn snapshot(&self) -> PumpStatsSnapshot {
        PumpStatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            skipped_ticks: self.skipped.load(Ordering::Relaxed),
            executed: self.executed.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            orphaned: self.orphaned.load(Ordering::Relaxed),
            carried: self.carried.load(Ordering::Relaxed),
            waiting: self.waiting.load(Ordering::Relaxed),
        }
    }

    fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }
}

/// Restaura la bandera `running` aunque el tick termine por panic
struct RunningGuard<'a>(&'a Cell<bool>);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

/// Consumidor de la cola en el main thread
pub struct Pump<H> {
    queue: TaskQueue<H>,
    config: PumpConfig,
    running: Cell<bool>,
    carry: RefCell<VecDeque<Task<H>>>,
    stats: Arc<PumpStats>,
}

impl<H> Pump<H> {
    pub fn new(queue: TaskQueue<H>, config: PumpConfig, stats: Arc<PumpStats>) -> Self {
        Self {
            queue,
            config,
            running: Cell::new(false),
            carry: RefCell::new(VecDeque::new()),
            stats,
        }
    }

    pub fn config(&self) -> PumpConfig {
        self.config
    }

    pub fn stats(&self) -> PumpStatsSnapshot {
        self.stats.snapshot()
    }

    /// Tasks drenados que esperan al siguiente tick
    pub fn carried_len(&self) -> usize {
        self.carry.borrow().len()
    }

    /// `true` si no hay nada guardado ni en cola
    pub fn is_idle(&self) -> bool {
        self.carried_len() == 0 && self.queue.is_empty()
    }

    /// Ejecuta un lote de tasks sobre el host
    pub fn tick(&self, host: &mut H) -> TickReport {
        if self.running.replace(true) {
            PumpStats::add(&self.stats.skipped, 1);
            debug!("pump tick skipped: another tick is in progress");
            return TickReport {
                skipped: true,
                ..TickReport::default()
            };
        }
        let _guard = RunningGuard(&self.running);
        PumpStats::add(&self.stats.ticks, 1);

        let started = Instant::now();
        let mut batch = self.carry.take();
        let room = self.config.max_tasks_per_tick.saturating_sub(batch.len());
        batch.extend(self.queue.drain_up_to(room));

        let mut report = TickReport::default();
        while let Some(task) = batch.pop_front() {
            if report.executed > 0 && started.elapsed() >= self.config.tick_budget {
                batch.push_front(task);
                break;
            }
            let task_report = task.execute(host);
            self.record(&task_report, &mut report);
        }

        report.carried = batch.len();
        if report.carried > 0 {
            PumpStats::add(&self.stats.carried, report.carried);
            debug!(carried = report.carried, "tick budget exhausted");
        }
        self.stats.waiting.store(batch.len() as u64, Ordering::Relaxed);
        *self.carry.borrow_mut() = batch;

        report.elapsed = started.elapsed();
        report
    }

    /// Ejecuta ticks hasta vaciar la cola y lo guardado
    ///
    /// Se usa al apagar, con la cola ya cerrada. Retorna cuántos tasks
    /// se ejecutaron.
    pub fn flush(&self, host: &mut H) -> usize {
        let mut executed = 0;
        while !self.is_idle() {
            let report = self.tick(host);
            if report.skipped {
                break;
            }
            executed += report.executed;
        }
        executed
    }

    fn record(&self, task: &TaskReport, report: &mut TickReport) {
        let meta = &task.meta;
        report.executed += 1;
        PumpStats::add(&self.stats.executed, 1);

        match &task.outcome {
            Ok(()) => {
                report.completed += 1;
                PumpStats::add(&self.stats.completed, 1);
                debug!(
                    task_id = %meta.id,
                    module = %meta.module,
                    operation = %meta.operation,
                    elapsed_ms = task.elapsed.as_millis() as u64,
                    "task completed"
                );
            }
            Err(err) => {
                report.failed += 1;
                PumpStats::add(&self.stats.failed, 1);
                warn!(
                    task_id = %meta.id,
                    module = %meta.module,
                    operation = %meta.operation,
                    detached = task.detached,
                    error = %err.reason,
                    "task failed"
                );
            }
        }

        if task.abandoned {
            report.orphaned += 1;
            PumpStats::add(&self.stats.orphaned, 1);
            warn!(
                task_id = %meta.id,
                module = %meta.module,
                operation = %meta.operation,
                late_by_ms = task.late_by.map(|d| d.as_millis() as u64),
                "orphaned task finished after its waiter timed out, result discarded"
            );
        }
    }
}
