//! # Runtime del Host
//! src/runtime/mod.rs
//!
//! Piezas que corren en el main thread: el loop que conduce al pump y las
//! señales que lo despiertan o lo detienen.

pub mod main_loop;
pub mod wakeup;

pub use main_loop::{LoopSummary, MainLoop};
pub use wakeup::{Shutdown, Wakeup};
