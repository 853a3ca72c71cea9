//! Example rows used to narrow generic patterns into concrete cases.
//!
//! A [`Row`] binds column names to wire strings. A cell may refer to a
//! variable (`$name`) or to a value captured from another exchange
//! (`$reference.key`); both are resolved when the cell is read.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One example: column name to cell text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Row {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub values: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub variables: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub references: HashMap<String, HashMap<String, String>>,
}

impl Row {
    pub fn new(columns: Vec<String>, values: Vec<String>) -> Self {
        Self {
            columns,
            values,
            ..Default::default()
        }
    }

    /// Build a row from `(column, value)` pairs
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let (columns, values) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self::new(columns, values)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_variables(mut self, variables: HashMap<String, String>) -> Self {
        self.variables = variables;
        self
    }

    pub fn with_references(mut self, references: HashMap<String, HashMap<String, String>>) -> Self {
        self.references = references;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn contains_field(&self, key: &str) -> bool {
        self.columns.iter().any(|c| c == key)
    }

    /// Raw cell text, before variable and reference substitution
    pub fn raw(&self, key: &str) -> Option<&str> {
        let index = self.columns.iter().position(|c| c == key)?;
        self.values.get(index).map(String::as_str)
    }

    /// Cell text with `$variable` and `$reference.key` resolved. A reference
    /// that cannot be resolved is returned verbatim.
    pub fn field(&self, key: &str) -> Option<String> {
        let raw = self.raw(key)?;
        let Some(name) = raw.strip_prefix('$') else {
            return Some(raw.to_string());
        };

        if let Some(value) = self.variables.get(name) {
            return Some(value.clone());
        }
        if let Some((reference, field)) = name.split_once('.') {
            if let Some(value) = self.references.get(reference).and_then(|r| r.get(field)) {
                return Some(value.clone());
            }
        }
        Some(raw.to_string())
    }

    /// Column to resolved cell text, in column order
    pub fn to_map(&self) -> IndexMap<String, String> {
        self.columns
            .iter()
            .filter_map(|c| self.field(c).map(|v| (c.clone(), v)))
            .collect()
    }
}

/// A table of example rows sharing one set of columns
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Examples {
    pub rows: Vec<Row>,
}

impl Examples {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows to generate from; no examples means a single empty row
    pub fn rows_or_empty(&self) -> Vec<Row> {
        if self.rows.is_empty() {
            vec![Row::default()]
        } else {
            self.rows.clone()
        }
    }
}
