// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Plugin registry and the plugin variants a Quarry extension can serve.
//!
//! The [`Registry`] groups plugins by [`RegistryCategory`](quarry_core::RegistryCategory)
//! and name. Each variant module wraps a small callback trait (for example
//! [`table::Table`] or [`config::ConfigSource`]) in a type implementing
//! [`Plugin`](quarry_core::Plugin), translating host requests into typed calls.

pub mod config;
pub mod distributed;
pub mod logger;
pub mod registry;
pub mod table;

pub use config::{ConfigPlugin, ConfigSource};
pub use distributed::{
    DistributedPlugin, DistributedQueries, DistributedResult, DistributedSource,
};
pub use logger::{LogKind, LogSink, LoggerPlugin};
pub use registry::{LookupMiss, Registry};
pub use table::memory::MemoryTable;
pub use table::{
    ColumnDefinition, ColumnType, Constraint, ConstraintList, MutableTable, MutableTablePlugin,
    Operator, QueryContext, Table, TablePlugin,
};
