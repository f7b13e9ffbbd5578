//! Logical schemas and column references.

use crate::velostream::sql::execution::types::SqlType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference to a column, optionally qualified by the source it comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub source: Option<String>,
    pub name: String,
}

impl ColumnRef {
    /// Unqualified column reference
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            source: None,
            name: name.into(),
        }
    }

    /// Column reference qualified by source alias (`source.name`)
    pub fn qualified(source: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{}.{}", source, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A named, typed column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Column {
    pub column_ref: ColumnRef,
    pub sql_type: SqlType,
}

impl Column {
    pub fn new(column_ref: ColumnRef, sql_type: SqlType) -> Self {
        Self {
            column_ref,
            sql_type,
        }
    }
}

/// Ordered sequence of value columns produced by an execution step
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalSchema {
    columns: Vec<Column>,
}

impl LogicalSchema {
    pub fn builder() -> LogicalSchemaBuilder {
        LogicalSchemaBuilder::default()
    }

    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Find the index of a column.
    ///
    /// A qualified reference must match exactly. An unqualified reference
    /// matches the first column with that name regardless of its source.
    pub fn index_of(&self, column_ref: &ColumnRef) -> Option<usize> {
        self.columns.iter().position(|c| match &column_ref.source {
            Some(_) => &c.column_ref == column_ref,
            None => c.column_ref.name == column_ref.name,
        })
    }

    /// Return a copy with every column qualified by `source`
    pub fn with_source(&self, source: &str) -> Self {
        Self {
            columns: self
                .columns
                .iter()
                .map(|c| Column::new(ColumnRef::qualified(source, &c.column_ref.name), c.sql_type.clone()))
                .collect(),
        }
    }

    /// Concatenate two schemas (left columns first), as produced by a join
    pub fn join(&self, right: &LogicalSchema) -> Self {
        let mut columns = self.columns.clone();
        columns.extend(right.columns.iter().cloned());
        Self { columns }
    }
}

impl fmt::Display for LogicalSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, c) in self.columns.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", c.column_ref, c.sql_type)?;
        }
        write!(f, "]")
    }
}

#[derive(Debug, Default)]
pub struct LogicalSchemaBuilder {
    columns: Vec<Column>,
}

impl LogicalSchemaBuilder {
    pub fn column(mut self, name: &str, sql_type: SqlType) -> Self {
        self.columns.push(Column::new(ColumnRef::new(name), sql_type));
        self
    }

    pub fn qualified_column(mut self, source: &str, name: &str, sql_type: SqlType) -> Self {
        self.columns
            .push(Column::new(ColumnRef::qualified(source, name), sql_type));
        self
    }

    pub fn build(self) -> LogicalSchema {
        LogicalSchema::new(self.columns)
    }
}
