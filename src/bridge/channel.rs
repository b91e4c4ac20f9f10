//! # Result Channel
//! src/bridge/channel.rs
//!
//! Canal de un solo uso entre el pump (que escribe) y el thread que envió
//! el task (que espera). La escritura ocurre una sola vez; las lecturas
//! son idempotentes y devuelven siempre el mismo valor.
//!
//! - `Completer<T>`: lo tiene el pump dentro del task
//! - `Ticket<T>`: lo tiene quien envió el task

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::task::{StatusCell, TaskId, TaskState};
use crate::error::{BridgeError, TaskExecutionError};

/// Resultado entregado por el canal
pub type Outcome<T> = Result<T, TaskExecutionError>;

struct Shared<T> {
    slot: Mutex<Option<Outcome<T>>>,
    signal: Condvar,
    status: Arc<StatusCell>,
    writes: AtomicUsize,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Option<Outcome<T>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Crea el par completer/ticket de un task
///
/// `fallback` es el error que recibe el ticket si el completer se destruye
/// sin haber escrito (el task nunca llegó a ejecutarse).
pub(crate) fn pair<T>(
    status: Arc<StatusCell>,
    fallback: TaskExecutionError,
) -> (Completer<T>, Ticket<T>) {
    let id = fallback.task_id;
    let shared = Arc::new(Shared {
        slot: Mutex::new(None),
        signal: Condvar::new(),
        status,
        writes: AtomicUsize::new(0),
    });

    let completer = Completer {
        shared: Arc::clone(&shared),
        fallback: Some(fallback),
    };
    let ticket = Ticket { id, shared };
    (completer, ticket)
}

/// Extremo de escritura del canal
pub(crate) struct Completer<T> {
    shared: Arc<Shared<T>>,
    fallback: Option<TaskExecutionError>,
}

impl<T> Completer<T> {
    /// Escribe el resultado. Retorna `false` si ya había uno.
    pub(crate) fn complete(mut self, outcome: Outcome<T>) -> bool {
        self.fallback = None;
        fill(&self.shared, outcome)
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some(fallback) = self.fallback.take() {
            fill(&self.shared, Err(fallback));
        }
    }
}

fn fill<T>(shared: &Shared<T>, outcome: Outcome<T>) -> bool {
    let mut slot = shared.lock();
    if slot.is_some() {
        return false;
    }

    let state = if outcome.is_ok() {
        TaskState::Completed
    } else {
        TaskState::Failed
    };
    *slot = Some(outcome);
    shared.status.set_state(state);
    shared.writes.fetch_add(1, Ordering::AcqRel);
    drop(slot);

    shared.signal.notify_all();
    true
}

/// Extremo de lectura del canal, devuelto a quien envió el task
pub struct Ticket<T> {
    id: TaskId,
    shared: Arc<Shared<T>>,
}

impl<T: Clone> Ticket<T> {
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Estado actual del task
    pub fn state(&self) -> TaskState {
        self.shared.status.state()
    }

    /// `true` si un waiter se rindió por timeout
    pub fn is_abandoned(&self) -> bool {
        self.shared.status.is_abandoned()
    }

    /// `true` si el resultado ya fue escrito
    pub fn is_signaled(&self) -> bool {
        self.shared.lock().is_some()
    }

    /// Cuántas veces se escribió el canal (0 o 1)
    pub fn signal_count(&self) -> usize {
        self.shared.writes.load(Ordering::Acquire)
    }

    /// Lee el resultado sin bloquear
    pub fn try_outcome(&self) -> Option<Outcome<T>> {
        self.shared.lock().clone()
    }

    /// Bloquea hasta que el pump entregue el resultado
    pub fn wait(&self) -> Outcome<T> {
        let mut slot = self.shared.lock();
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            slot = self
                .shared
                .signal
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Espera como máximo `timeout`
    ///
    /// Si el tiempo se agota el task queda marcado como abandonado pero
    /// sigue en la cola: puede ejecutarse más tarde y su resultado se
    /// descarta.
    pub fn wait_timeout(&self, timeout: Duration) -> Result<T, BridgeError> {
        let slot = self.shared.lock();
        let (slot, _) = self
            .shared
            .signal
            .wait_timeout_while(slot, timeout, |slot| slot.is_none())
            .unwrap_or_else(PoisonError::into_inner);

        match slot.as_ref() {
            Some(outcome) => outcome.clone().map_err(BridgeError::from),
            None => {
                // Con el lock tomado: el pump no puede escribir entre medio
                self.shared.status.mark_abandoned();
                Err(BridgeError::Timeout {
                    task_id: self.id,
                    waited: timeout,
                })
            }
        }
    }
}

impl<T> std::fmt::Debug for Ticket<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ticket")
            .field("id", &self.id)
            .field("state", &self.shared.status.state())
            .finish()
    }
}
