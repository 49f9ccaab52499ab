//! Resonance Bus: the Event Horizon
//!
//! Synchronous publish/subscribe with a derived resonance score per event,
//! a bounded history ring, and windowed field metrics. Handlers that need
//! to do async work hand it back as `Delivery::Deferred`; the bus spawns it
//! on the task supervisor and never waits for it.

pub mod handler;
pub mod history;
pub mod horizon;
pub mod resonance;
pub mod supervisor;

pub use handler::{Delivery, DeferredWork, Handler, HandlerResult, SubscriptionId, Topic};
pub use history::{HistoryFilter, ResonanceField};
pub use horizon::{BusStats, EventHorizon};
pub use resonance::ResonanceWeights;
pub use supervisor::TaskSupervisor;
