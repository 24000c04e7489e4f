// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory mutable table.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use quarry_core::{row, PluginError, Row};
use serde_json::Value;

use super::{ColumnDefinition, ColumnType, MutableTable, QueryContext, Table};

/// A [`MutableTable`] whose rows live in the plugin instance.
///
/// Scans share a read lock; inserts, updates and deletes take the write lock,
/// so a scan never observes a half-written row. Row ids are positions: deleting
/// row `i` shifts every later row down by one.
pub struct MemoryTable {
    columns: Vec<ColumnDefinition>,
    rows: RwLock<Vec<Row>>,
}

impl MemoryTable {
    pub fn new(columns: Vec<ColumnDefinition>) -> Self {
        Self::with_rows(columns, Vec::new())
    }

    pub fn with_rows(columns: Vec<ColumnDefinition>, rows: Vec<Row>) -> Self {
        Self {
            columns,
            rows: RwLock::new(rows),
        }
    }

    /// Copy of the current rows.
    pub fn snapshot(&self) -> Result<Vec<Row>, PluginError> {
        Ok(self.read()?.clone())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Vec<Row>>, PluginError> {
        self.rows
            .read()
            .map_err(|_| PluginError::Failed("table lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Vec<Row>>, PluginError> {
        self.rows
            .write()
            .map_err(|_| PluginError::Failed("table lock poisoned".into()))
    }

    /// Formats one value per column into a row.
    fn build_row(&self, values: Vec<Value>) -> Result<Row, PluginError> {
        if values.len() != self.columns.len() {
            return Err(PluginError::InvalidRequest(format!(
                "expected {} values, got {}",
                self.columns.len(),
                values.len()
            )));
        }
        self.columns
            .iter()
            .zip(values)
            .map(|(column, value)| Ok((column.name.clone(), format_value(column, value)?)))
            .collect()
    }
}

fn format_value(column: &ColumnDefinition, value: Value) -> Result<String, PluginError> {
    let invalid = |value: &Value| {
        PluginError::InvalidRequest(format!(
            "column {} expects {}, got {value}",
            column.name, column.column_type
        ))
    };
    match (column.column_type, value) {
        (_, Value::Null) => Ok(String::new()),
        (ColumnType::Text, Value::String(s)) => Ok(s),
        (ColumnType::Text, other) => Ok(other.to_string()),
        (ColumnType::Integer | ColumnType::BigInt, Value::Number(n)) => match n.as_i64() {
            Some(i) => Ok(i.to_string()),
            None => n
                .as_f64()
                .map(|f| (f.trunc() as i64).to_string())
                .ok_or_else(|| invalid(&Value::Number(n))),
        },
        (ColumnType::Double, Value::Number(n)) => n
            .as_f64()
            .map(|f| f.to_string())
            .ok_or_else(|| invalid(&Value::Number(n))),
        (ColumnType::Integer | ColumnType::BigInt, Value::String(s)) => match parse_integer(&s) {
            Some(i) => Ok(i.to_string()),
            None => Err(invalid(&Value::String(s))),
        },
        (ColumnType::Double, Value::String(s)) if s.parse::<f64>().is_ok() => Ok(s),
        (_, other) => Err(invalid(&other)),
    }
}

/// Integer columns truncate fractional input the same way for numbers and
/// numeric strings.
fn parse_integer(s: &str) -> Option<i64> {
    s.parse::<i64>().ok().or_else(|| {
        s.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f.trunc() as i64)
    })
}

fn position(row_id: i64, len: usize) -> Result<usize, PluginError> {
    usize::try_from(row_id)
        .ok()
        .filter(|&index| index < len)
        .ok_or(PluginError::RowOutOfRange { id: row_id, len })
}

#[async_trait]
impl Table for MemoryTable {
    fn columns(&self) -> Vec<ColumnDefinition> {
        self.columns.clone()
    }

    async fn generate(&self, _context: &QueryContext) -> Result<Vec<Row>, PluginError> {
        self.snapshot()
    }
}

#[async_trait]
impl MutableTable for MemoryTable {
    async fn insert(&self, _auto_rowid: bool, values: Vec<Value>) -> Result<Vec<Row>, PluginError> {
        let new_row = self.build_row(values)?;
        let mut rows = self.write()?;
        rows.push(new_row);
        let id = (rows.len() - 1).to_string();
        Ok(vec![row([("id", id.as_str()), ("status", "success")])])
    }

    async fn update(&self, row_id: i64, values: Vec<Value>) -> Result<(), PluginError> {
        let new_row = self.build_row(values)?;
        let mut rows = self.write()?;
        let index = position(row_id, rows.len())?;
        rows[index] = new_row;
        Ok(())
    }

    async fn delete(&self, row_id: i64) -> Result<(), PluginError> {
        let mut rows = self.write()?;
        let index = position(row_id, rows.len())?;
        rows.remove(index);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::MutableTablePlugin;
    use quarry_core::{Plugin, PluginRequest};
    use serde_json::json;
    use std::sync::Arc;

    fn columns() -> Vec<ColumnDefinition> {
        vec![
            ColumnDefinition::integer("i"),
            ColumnDefinition::big_int("b"),
            ColumnDefinition::double("d"),
            ColumnDefinition::text("t"),
        ]
    }

    fn seeded() -> MemoryTable {
        MemoryTable::with_rows(
            columns(),
            vec![
                row([("i", "1234"), ("b", "12345678900"), ("d", "1.2345"), ("t", "hello")]),
                row([
                    ("i", "-1234"),
                    ("b", "-12345678900"),
                    ("d", "-1.2345"),
                    ("t", "world"),
                ]),
            ],
        )
    }

    fn request(pairs: &[(&str, &str)]) -> PluginRequest {
        row(pairs.iter().copied())
    }

    #[tokio::test]
    async fn insert_delete_update_use_positions() {
        let table = seeded();

        let inserted = table
            .insert(false, vec![json!(5678), json!(5678), json!(5.5), json!("new")])
            .await
            .unwrap();
        assert_eq!(inserted, vec![row([("id", "2"), ("status", "success")])]);
        let rows = table.snapshot().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2]["i"], "5678");
        assert_eq!(rows[2]["d"], "5.5");
        assert_eq!(rows[2]["t"], "new");

        table.delete(0).await.unwrap();
        let rows = table.snapshot().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["i"], "-1234");
        assert_eq!(rows[1]["i"], "5678");

        table
            .update(0, vec![json!(1), json!(2), json!(3.25), json!("replaced")])
            .await
            .unwrap();
        let rows = table.snapshot().unwrap();
        assert_eq!(
            rows[0],
            row([("i", "1"), ("b", "2"), ("d", "3.25"), ("t", "replaced")])
        );
        assert_eq!(rows[1]["i"], "5678");
    }

    #[tokio::test]
    async fn out_of_range_ids_are_errors() {
        let table = seeded();
        assert!(matches!(
            table.delete(2).await,
            Err(PluginError::RowOutOfRange { id: 2, len: 2 })
        ));
        assert!(matches!(
            table.delete(-1).await,
            Err(PluginError::RowOutOfRange { id: -1, .. })
        ));
        let update = table
            .update(7, vec![json!(1), json!(2), json!(3.0), json!("x")])
            .await;
        assert!(matches!(update, Err(PluginError::RowOutOfRange { id: 7, .. })));
        assert_eq!(table.snapshot().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn wrong_value_count_is_rejected() {
        let table = seeded();
        let result = table.insert(false, vec![json!(1)]).await;
        assert!(matches!(result, Err(PluginError::InvalidRequest(_))));
        assert_eq!(table.snapshot().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn numeric_strings_format_like_numbers() {
        let table = MemoryTable::new(columns());
        table
            .insert(false, vec![json!("1.5"), json!("-7.9"), json!("2.5"), json!(3)])
            .await
            .unwrap();
        table
            .insert(false, vec![json!(1.5), json!(-7.9), json!(2.5), json!("3")])
            .await
            .unwrap();

        let rows = table.snapshot().unwrap();
        assert_eq!(rows[0], rows[1]);
        assert_eq!(rows[0]["i"], "1");
        assert_eq!(rows[0]["b"], "-7");
        assert_eq!(rows[0]["d"], "2.5");
        assert_eq!(rows[0]["t"], "3");

        let rejected = table
            .insert(false, vec![json!("one"), json!(1), json!(1.0), json!("x")])
            .await;
        assert!(matches!(rejected, Err(PluginError::InvalidRequest(_))));
        assert_eq!(table.snapshot().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn plugin_actions_drive_the_store() {
        let plugin = MutableTablePlugin::new("mutable_table", seeded());

        let response = plugin
            .call(request(&[
                ("action", "insert"),
                ("auto_rowid", "true"),
                ("json_value_array", r#"[5678, 5678, 1.5, "x"]"#),
            ]))
            .await;
        assert!(response.status.is_ok());
        assert_eq!(response.response[0]["id"], "2");

        let response = plugin
            .call(request(&[("action", "delete"), ("id", "0")]))
            .await;
        assert_eq!(response.response, vec![row([("status", "success")])]);

        let response = plugin
            .call(request(&[
                ("action", "update"),
                ("id", "0"),
                ("json_value_array", r#"[9, 9, 9.5, "nine"]"#),
            ]))
            .await;
        assert!(response.status.is_ok());

        let response = plugin.call(request(&[("action", "generate")])).await;
        let first: Vec<&str> = response.response.iter().map(|r| r["t"].as_str()).collect();
        assert_eq!(first, vec!["nine", "x"]);
    }

    #[tokio::test]
    async fn malformed_mutation_requests_are_status_errors() {
        let plugin = MutableTablePlugin::new("mutable_table", seeded());

        let bad_id = plugin
            .call(request(&[("action", "delete"), ("id", "first")]))
            .await;
        assert_eq!(bad_id.status.code, 1);

        let bad_json = plugin
            .call(request(&[
                ("action", "update"),
                ("id", "0"),
                ("json_value_array", "[1,"),
            ]))
            .await;
        assert_eq!(bad_json.status.code, 1);

        let out_of_range = plugin
            .call(request(&[("action", "delete"), ("id", "99")]))
            .await;
        assert_eq!(out_of_range.status.code, 1);
        assert_eq!(
            out_of_range.status.message,
            "row 99 out of range (table has 2 rows)"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn scans_never_observe_partial_rows() {
        let table = Arc::new(seeded());

        let writer = {
            let table = Arc::clone(&table);
            tokio::spawn(async move {
                for n in 0..200i64 {
                    let text = format!("row{n}");
                    table
                        .insert(false, vec![json!(n), json!(n), json!(n as f64), json!(text)])
                        .await
                        .unwrap();
                    if n % 3 == 0 {
                        table.delete(0).await.unwrap();
                    }
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let table = Arc::clone(&table);
                tokio::spawn(async move {
                    for _ in 0..200 {
                        let rows = table.generate(&QueryContext::default()).await.unwrap();
                        for r in &rows {
                            assert_eq!(r.len(), 4);
                            if let Some(n) = r["t"].strip_prefix("row") {
                                assert_eq!(r["i"], n);
                                assert_eq!(r["b"], n);
                            }
                        }
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
    }
}
