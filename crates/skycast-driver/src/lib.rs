//! Weather entity driver for the remote.
//!
//! Wires the configuration store and weather poller to the host's entity
//! framework and keeps initialization to exactly once per configuration.

pub mod app;
pub mod entity;
pub mod lifecycle;
pub mod setup;

pub use app::{Driver, DriverSettings};
pub use entity::{
    Availability, CommandStatus, DeviceState, EntityAttributes, EntityCommand, EntityHost,
    LoggingHost, WeatherEntity,
};
pub use lifecycle::{LifecycleCoordinator, LifecycleEvent, LifecycleState, TriggerOutcome};
pub use setup::{SetupError, SetupFlow, SetupRequest};
