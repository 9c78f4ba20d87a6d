//! Component-supervision runtime: the per-node health-inspection engine
//! (Event Filter, Collector, Checker, Component, Frequency Controller,
//! Common Service, Hang Detector) that the `rigwatch` daemon binary drives.

pub mod checker;
pub mod collector;
pub mod component;
pub mod daemon;
pub mod error;
pub mod event_filter;
pub mod freq;
pub mod hang;
pub mod model;
pub mod ring_buffer;
pub mod service;
pub mod snapshot;

pub use checker::Checker;
pub use collector::Collector;
pub use component::{Component, ComponentHandle, ComponentRegistry};
pub use daemon::{DaemonService, Summary};
pub use error::{CheckError, CollectError, ComponentError, EventFilterError};
pub use event_filter::{EventFilter, FileRegistry, Matched};
pub use freq::FreqController;
pub use hang::{HangChecker, HangRule};
pub use service::{CommonService, CommonServiceHandle, ServiceState};
pub use snapshot::Snapshot;
