// SPDX-FileCopyrightText: 2026 Quarry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Table plugins: read-only tables and tables accepting inserts, updates and
//! deletes.

pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use quarry_core::{
    row, ExtensionResponse, Plugin, PluginError, PluginRequest, PluginRoutes, Row,
};
use serde::Deserialize;
use strum::{Display, EnumString};
use tracing::debug;

/// SQL type of a table column as announced to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
pub enum ColumnType {
    #[strum(serialize = "TEXT")]
    Text,
    #[strum(serialize = "INTEGER")]
    Integer,
    #[strum(serialize = "BIGINT")]
    BigInt,
    #[strum(serialize = "DOUBLE")]
    Double,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Text)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Integer)
    }

    pub fn big_int(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::BigInt)
    }

    pub fn double(name: impl Into<String>) -> Self {
        Self::new(name, ColumnType::Double)
    }

    fn route(&self) -> Row {
        row([
            ("id", "column".to_string()),
            ("name", self.name.clone()),
            ("type", self.column_type.to_string()),
            ("op", "0".to_string()),
        ])
    }
}

/// Comparison the host applies to a column in a `WHERE` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Unique,
    Equals,
    GreaterThan,
    LessThanOrEquals,
    LessThan,
    GreaterThanOrEquals,
    Match,
    Like,
    Glob,
    Regexp,
}

impl TryFrom<u8> for Operator {
    type Error = PluginError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Ok(match code {
            1 => Operator::Unique,
            2 => Operator::Equals,
            4 => Operator::GreaterThan,
            8 => Operator::LessThanOrEquals,
            16 => Operator::LessThan,
            32 => Operator::GreaterThanOrEquals,
            64 => Operator::Match,
            65 => Operator::Like,
            66 => Operator::Glob,
            67 => Operator::Regexp,
            other => {
                return Err(PluginError::InvalidRequest(format!(
                    "unknown constraint operator {other}"
                )));
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    pub operator: Operator,
    pub expression: String,
}

/// Constraints applying to one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintList {
    pub affinity: ColumnType,
    pub constraints: Vec<Constraint>,
}

/// Column constraints the host pushed down with a `generate` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryContext {
    pub constraints: BTreeMap<String, ConstraintList>,
}

#[derive(Deserialize)]
struct RawContext {
    #[serde(default)]
    constraints: Vec<RawColumn>,
}

#[derive(Deserialize)]
struct RawColumn {
    name: String,
    #[serde(default)]
    list: RawList,
    #[serde(default = "default_affinity")]
    affinity: String,
}

// The host encodes an empty constraint list as "".
#[derive(Deserialize)]
#[serde(untagged)]
enum RawList {
    Items(Vec<RawConstraint>),
    Empty(String),
}

impl Default for RawList {
    fn default() -> Self {
        RawList::Items(Vec::new())
    }
}

#[derive(Deserialize)]
struct RawConstraint {
    op: u8,
    expr: String,
}

fn default_affinity() -> String {
    ColumnType::Text.to_string()
}

impl QueryContext {
    /// Parses the JSON query context sent by the host.
    pub fn parse(json: &str) -> Result<Self, PluginError> {
        let raw: RawContext = serde_json::from_str(json)?;
        let mut constraints = BTreeMap::new();
        for column in raw.constraints {
            let affinity = column.affinity.parse().map_err(|_| {
                PluginError::InvalidRequest(format!("unknown column affinity {}", column.affinity))
            })?;
            let items = match column.list {
                RawList::Items(items) => items,
                RawList::Empty(_) => Vec::new(),
            };
            let list = items
                .into_iter()
                .map(|item| {
                    Ok(Constraint {
                        operator: Operator::try_from(item.op)?,
                        expression: item.expr,
                    })
                })
                .collect::<Result<Vec<_>, PluginError>>()?;
            constraints.insert(
                column.name,
                ConstraintList {
                    affinity,
                    constraints: list,
                },
            );
        }
        Ok(Self { constraints })
    }

    /// Expressions constrained by equality on `column`.
    pub fn equals(&self, column: &str) -> Vec<&str> {
        self.constraints
            .get(column)
            .map(|list| {
                list.constraints
                    .iter()
                    .filter(|c| c.operator == Operator::Equals)
                    .map(|c| c.expression.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// A read-only table.
#[async_trait]
pub trait Table: Send + Sync + 'static {
    fn columns(&self) -> Vec<ColumnDefinition>;

    async fn generate(&self, context: &QueryContext) -> Result<Vec<Row>, PluginError>;

    async fn shutdown(&self) {}
}

/// A table that also accepts row mutations.
///
/// Row ids are zero-based positions in the table as last generated.
#[async_trait]
pub trait MutableTable: Table {
    /// Appends a row built from `values` (one per column, in column order)
    /// and returns a status row for the host.
    async fn insert(
        &self,
        auto_rowid: bool,
        values: Vec<serde_json::Value>,
    ) -> Result<Vec<Row>, PluginError>;

    async fn update(&self, row_id: i64, values: Vec<serde_json::Value>) -> Result<(), PluginError>;

    async fn delete(&self, row_id: i64) -> Result<(), PluginError>;
}

/// Serves a [`Table`] under the `table` registry.
pub struct TablePlugin<T> {
    name: String,
    table: T,
}

impl<T: Table> TablePlugin<T> {
    pub fn new(name: impl Into<String>, table: T) -> Self {
        Self {
            name: name.into(),
            table,
        }
    }

    pub fn table(&self) -> &T {
        &self.table
    }
}

/// Serves a [`MutableTable`], adding `insert`, `update` and `delete` actions.
pub struct MutableTablePlugin<T> {
    name: String,
    table: T,
}

impl<T: MutableTable> MutableTablePlugin<T> {
    pub fn new(name: impl Into<String>, table: T) -> Self {
        Self {
            name: name.into(),
            table,
        }
    }

    pub fn table(&self) -> &T {
        &self.table
    }
}

fn column_routes(columns: &[ColumnDefinition]) -> PluginRoutes {
    columns.iter().map(ColumnDefinition::route).collect()
}

fn action(request: &PluginRequest) -> &str {
    request.get("action").map(String::as_str).unwrap_or_default()
}

async fn read_action<T: Table + ?Sized>(
    name: &str,
    table: &T,
    request: &PluginRequest,
) -> ExtensionResponse {
    match action(request) {
        "generate" => {
            let context = match request.get("context") {
                Some(json) if !json.is_empty() => QueryContext::parse(json),
                _ => Ok(QueryContext::default()),
            };
            let result = match context {
                Ok(context) => table.generate(&context).await,
                Err(e) => Err(e),
            };
            ExtensionResponse::from_result(result)
        }
        "columns" => ExtensionResponse::ok(column_routes(&table.columns())),
        other => {
            debug!(table = name, action = other, "unknown table action");
            ExtensionResponse::error(format!("table plugin got unknown action {other}"))
        }
    }
}

fn values(request: &PluginRequest) -> Result<Vec<serde_json::Value>, PluginError> {
    let json = request
        .get("json_value_array")
        .ok_or_else(|| PluginError::InvalidRequest("missing json_value_array".into()))?;
    Ok(serde_json::from_str(json)?)
}

fn row_id(request: &PluginRequest) -> Result<i64, PluginError> {
    let id = request
        .get("id")
        .ok_or_else(|| PluginError::InvalidRequest("missing id".into()))?;
    id.parse()
        .map_err(|e| PluginError::InvalidRequest(format!("invalid row id {id:?}: {e}")))
}

fn success() -> Vec<Row> {
    vec![row([("status", "success")])]
}

#[async_trait]
impl<T: Table> Plugin for TablePlugin<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn registry_name(&self) -> &str {
        "table"
    }

    fn routes(&self) -> PluginRoutes {
        column_routes(&self.table.columns())
    }

    async fn call(&self, request: PluginRequest) -> ExtensionResponse {
        read_action(&self.name, &self.table, &request).await
    }

    async fn shutdown(&self) {
        self.table.shutdown().await;
    }
}

#[async_trait]
impl<T: MutableTable> Plugin for MutableTablePlugin<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn registry_name(&self) -> &str {
        "table"
    }

    fn routes(&self) -> PluginRoutes {
        column_routes(&self.table.columns())
    }

    async fn call(&self, request: PluginRequest) -> ExtensionResponse {
        let result = match action(&request) {
            "insert" => match values(&request) {
                Ok(values) => {
                    let auto_rowid = request.get("auto_rowid").is_some_and(|v| v == "true");
                    self.table.insert(auto_rowid, values).await
                }
                Err(e) => Err(e),
            },
            "update" => match row_id(&request).and_then(|id| Ok((id, values(&request)?))) {
                Ok((id, values)) => self.table.update(id, values).await.map(|()| success()),
                Err(e) => Err(e),
            },
            "delete" => match row_id(&request) {
                Ok(id) => self.table.delete(id).await.map(|()| success()),
                Err(e) => Err(e),
            },
            _ => return read_action(&self.name, &self.table, &request).await,
        };
        ExtensionResponse::from_result(result)
    }

    async fn shutdown(&self) {
        self.table.shutdown().await;
    }
}
