//! # fp-pipeline
//!
//! Command graph, plugins and job lifecycle for forgepack.
//!
//! - **Commands** ([`Command`]) -- one invocation of a provisioned tool, with
//!   its arguments, outputs, dependencies and status.
//! - **Plugins** ([`Plugin`], [`PluginRegistry`]) -- units that contribute
//!   commands and named assets to a job.
//! - **Graph** ([`graph::order`]) -- dependency-respecting, priority-aware
//!   execution order.
//! - **Jobs** ([`Job`]) -- open, attach, run, close; state persisted as JSON
//!   after every change ([`JobState`]).

pub mod command;
pub mod graph;
pub mod job;
pub mod plugin;
pub mod plugins;
pub mod state;

// ---- Re-exports for convenience ----

pub use command::{ArgSet, Command, CommandStatus, OptValue};
pub use job::Job;
pub use plugin::{JobContext, Plugin, PluginConstructor, PluginRegistry};
pub use state::JobState;
