//! Fixed-interval tick scheduler for Lobbyforge.
//!
//! Every lobby actor owns one [`TickScheduler`]. Each tick it diffs the
//! roster and broadcasts whatever moved, so the scheduler's job is small:
//! wake up every `interval` (20 ms by default), say how late it was, and
//! warn when the lobby's work eats too much of the budget.
//!
//! After [`TickScheduler::stop`], [`TickScheduler::wait_for_tick`] pends
//! forever. A closing lobby stops its ticker first, so the other `select!`
//! branches drain without one more broadcast going out.
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         biased;
//!         Some(ctl) = control_rx.recv() => { /* shutdown */ }
//!         Some(cmd) = cmd_rx.recv() => { /* join/leave/info */ }
//!         Some(msg) = gameplay_rx.recv() => { /* apply transform */ }
//!         _ = scheduler.wait_for_tick() => {
//!             let changes = roster.collect_changes(&model);
//!             scheduler.record_tick_end();
//!         }
//!     }
//! }
//! ```

mod config;
mod metrics;
mod scheduler;

pub use config::{TickConfig, TickPolicy};
pub use metrics::TickMetrics;
pub use scheduler::{TickInfo, TickScheduler};
