//! # Ensamblado de la Aplicación
//! src/app.rs
//!
//! Une las piezas: puente, módulos incluidos, registry, servidor y main
//! loop. Lo usan `main.rs` y los tests de integración.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use tracing::info;

use crate::bridge::{Bridge, Pump};
use crate::config::Config;
use crate::error::RegistrationError;
use crate::handlers::{documents, parameters, system};
use crate::host::DocumentHost;
use crate::metrics::MetricsCollector;
use crate::modules::{load_modules, Capabilities, Registry, RegistrySlot};
use crate::runtime::{MainLoop, Shutdown};
use crate::server::Server;

/// Todo lo necesario para arrancar, antes de bloquear el main thread
pub struct App<H> {
    bridge: Bridge<H>,
    pump: Pump<H>,
    registry: Arc<Registry>,
    metrics: MetricsCollector,
    shutdown: Shutdown,
}

/// Construye el puente y carga los módulos incluidos
///
/// Las capabilities salen del host. Los módulos que no cargan quedan en
/// `/system/modules`; solo una colisión de rutas es un error.
pub fn assemble<H: DocumentHost>(config: &Config, host: &H) -> Result<App<H>, RegistrationError> {
    let (bridge, pump) = Bridge::<H>::new(&config.bridge_settings());
    let metrics = MetricsCollector::new();
    let shutdown = Shutdown::new(bridge.wakeup());
    let slot = RegistrySlot::new();

    let modules = vec![
        system::module(system::SystemContext {
            registry: slot.clone(),
            monitor: Arc::new(bridge.clone()),
            metrics: metrics.clone(),
            shutdown: shutdown.clone(),
            host_name: host.name().to_string(),
            started_at: Instant::now(),
        }),
        documents::module(bridge.client(documents::MODULE_NAME)),
        parameters::module(bridge.client(parameters::MODULE_NAME)),
    ];

    let capabilities = Capabilities::new(host.capabilities());
    let registry = Arc::new(load_modules(modules, &capabilities)?);
    slot.publish(Arc::clone(&registry));

    info!(
        host = host.name(),
        loaded = registry.loaded().count(),
        skipped = registry.skipped().count(),
        routes = registry.router().len(),
        "modules assembled"
    );

    Ok(App {
        bridge,
        pump,
        registry,
        metrics,
        shutdown,
    })
}

impl<H: 'static> App<H> {
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn bridge(&self) -> &Bridge<H> {
        &self.bridge
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Abre el listener y atiende conexiones en otro thread
    pub fn spawn_server(&self, config: &Config) -> io::Result<(SocketAddr, JoinHandle<()>)> {
        Server::bind(
            &config.address(),
            Arc::clone(&self.registry),
            self.metrics.clone(),
            config.max_body_bytes,
        )?
        .spawn()
    }

    /// Entrega el pump al loop que corre en el thread del host
    pub fn into_main_loop(self, config: &Config) -> MainLoop<H> {
        MainLoop::new(self.pump, self.bridge, config.tick_interval(), self.shutdown)
    }
}
