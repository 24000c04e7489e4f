// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Demo plugin sets served by the subcommands.

pub mod config;
pub mod events;
pub mod table;
