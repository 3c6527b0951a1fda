//! Capability traits: one production (HTTP-backed) implementation and one
//! fake implementation per trait, per SPEC_FULL.md's design note that there
//! is no plugin system — just a seam the workers depend on, with tests
//! supplying fakes.

pub mod camera;
pub mod notifier;
pub mod schedule;
pub mod uploader;

pub use camera::Camera;
pub use notifier::{NotificationAction, Notifier, NotifierEvent};
pub use schedule::{Game, MatchSchedule};
pub use uploader::Uploader;
