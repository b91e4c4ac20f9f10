//! # Main Loop
//! src/runtime/main_loop.rs
//!
//! Hace las veces del event loop del host: en el thread dueño del host
//! espera trabajo (o el intervalo de tick) y llama a `Pump::tick`. Al
//! recibir `Shutdown` cierra la cola y ejecuta lo pendiente antes de salir.

use std::time::Duration;

use tracing::info;

use super::wakeup::Shutdown;
use crate::bridge::{Bridge, Pump, TickReport};

/// Totales de una ejecución del main loop
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub ticks: u64,
    pub executed: usize,
    pub completed: usize,
    pub failed: usize,
    pub orphaned: usize,

    /// Tasks ejecutados durante el cierre
    pub flushed: usize,
}

impl LoopSummary {
    fn absorb(&mut self, report: &TickReport) {
        if report.skipped {
            return;
        }
        self.ticks += 1;
        self.executed += report.executed;
        self.completed += report.completed;
        self.failed += report.failed;
        self.orphaned += report.orphaned;
    }
}

/// Loop que conduce el pump desde el thread del host
pub struct MainLoop<H> {
    pump: Pump<H>,
    bridge: Bridge<H>,
    tick_interval: Duration,
    shutdown: Shutdown,
}

impl<H: 'static> MainLoop<H> {
    pub fn new(pump: Pump<H>, bridge: Bridge<H>, tick_interval: Duration, shutdown: Shutdown) -> Self {
        Self {
            pump,
            bridge,
            tick_interval,
            shutdown,
        }
    }

    pub fn pump(&self) -> &Pump<H> {
        &self.pump
    }

    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Corre hasta que se pida shutdown
    pub fn run(&self, host: &mut H) -> LoopSummary {
        info!(
            tick_interval_ms = self.tick_interval.as_millis() as u64,
            "main loop started"
        );

        let wakeup = self.bridge.wakeup();
        let mut summary = LoopSummary::default();

        loop {
            if self.pump.is_idle() {
                wakeup.wait_timeout(self.tick_interval);
            }
            if self.shutdown.is_requested() {
                break;
            }
            let report = self.pump.tick(host);
            summary.absorb(&report);
        }

        self.bridge.close();
        summary.flushed = self.pump.flush(host);

        info!(
            ticks = summary.ticks,
            executed = summary.executed,
            flushed = summary.flushed,
            "main loop stopped"
        );
        summary
    }
}
