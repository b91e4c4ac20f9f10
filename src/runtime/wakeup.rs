//! # Señales del Main Loop
//! src/runtime/wakeup.rs
//!
//! `Wakeup` despierta al main loop cuando llega trabajo nuevo, para no
//! esperar al siguiente tick. `Shutdown` es la bandera de parada.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Señal de "hay trabajo" con memoria: un `notify` sin nadie esperando
/// no se pierde, lo consume el próximo `wait_timeout`.
#[derive(Debug, Clone, Default)]
pub struct Wakeup {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Wakeup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        let (pending, signal) = &*self.inner;
        *pending.lock().unwrap_or_else(PoisonError::into_inner) = true;
        signal.notify_all();
    }

    /// Espera una notificación o el timeout
    ///
    /// Retorna `true` si hubo notificación (y la consume).
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (pending, signal) = &*self.inner;
        let guard = pending.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut guard, _) = signal
            .wait_timeout_while(guard, timeout, |pending| !*pending)
            .unwrap_or_else(PoisonError::into_inner);

        std::mem::replace(&mut *guard, false)
    }
}

/// Bandera de parada compartida entre el servidor y el main loop
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    requested: Arc<AtomicBool>,
    wakeup: Wakeup,
}

impl Shutdown {
    /// Crea una bandera que despierta a `wakeup` al activarse
    pub fn new(wakeup: Wakeup) -> Self {
        Self {
            requested: Arc::new(AtomicBool::new(false)),
            wakeup,
        }
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
        self.wakeup.notify();
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}
