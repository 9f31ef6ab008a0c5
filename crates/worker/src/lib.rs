//! The caching decision engine.
//!
//! A [`Worker`] owns one cache generation and reacts to the events a
//! browser would deliver to a service worker: lifecycle (`install`,
//! `activate`), `fetch` interception, and background signals (`sync`,
//! `push`, `notificationclick`, `message`).
//!
//! ```text
//! Worker
//!   ├── Lifecycle        install → activate → active
//!   ├── RouteRules       bypass | network-first | cache-first
//!   ├── StrategyExecutor cache → network → offline page → 503
//!   └── SignalRelay      page clients, notifications, control messages
//! ```

pub mod lifecycle;
pub mod router;
pub mod signal;
pub mod strategy;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use lifecycle::{ActivateReport, InstallReport, Lifecycle, LifecycleState};
pub use router::{Route, RouteRules};
pub use signal::{
    ClientId, ClientInfo, ClientRegistry, ControlMessage, MessageOutcome, Notification, NotificationData, Platform,
    ReplyPort, SignalRelay, VersionReply, WindowAction, WorkerMessage,
};
pub use strategy::StrategyExecutor;
pub use worker::{EventName, EventOutcome, Worker, WorkerConfig, WorkerEvent};
