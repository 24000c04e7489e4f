// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;
use quarry_core::{row, Plugin, PluginError, Row};
use quarry_plugin::{
    ColumnDefinition, MemoryTable, MutableTablePlugin, QueryContext, Table, TablePlugin,
};

/// One static row of every column type.
pub struct ExampleTable;

#[async_trait]
impl Table for ExampleTable {
    fn columns(&self) -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::text("text"),
            ColumnDefinition::integer("integer"),
            ColumnDefinition::big_int("big_int"),
            ColumnDefinition::double("double"),
        ]
    }

    async fn generate(&self, _context: &QueryContext) -> Result<Vec<Row>, PluginError> {
        Ok(vec![row([
            ("text", "hello world"),
            ("integer", "123"),
            ("big_int", "-1234567890"),
            ("double", "3.14159"),
        ])])
    }
}

pub fn mutable_table() -> MemoryTable {
    MemoryTable::with_rows(
        vec![
            ColumnDefinition::integer("i"),
            ColumnDefinition::big_int("b"),
            ColumnDefinition::double("d"),
            ColumnDefinition::text("t"),
        ],
        vec![
            row([("i", "1234"), ("b", "12345678900"), ("d", "1.2345"), ("t", "hello")]),
            row([("i", "-1234"), ("b", "-12345678900"), ("d", "-1.2345"), ("t", "world")]),
        ],
    )
}

pub fn plugins() -> Vec<Box<dyn Plugin>> {
    vec![
        Box::new(TablePlugin::new("example_table", ExampleTable)),
        Box::new(MutableTablePlugin::new("mutable_table", mutable_table())),
    ]
}
