//! Infrastructure layer: event store adapters, command dispatch, projections, reports
//! and the inventory workflows that tie them together.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod reports;
pub mod workflow;
