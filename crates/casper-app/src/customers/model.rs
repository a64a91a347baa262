use casper_db::{Entity, Record, Row, Value};
use serde::{Deserialize, Serialize};

/// A persisted customer row.
#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    /// Store-generated id; `None` until inserted.
    pub id: Option<i64>,
    pub name: String,
    pub email: Option<String>,
    /// Optimistic-concurrency version, starting at 1.
    pub row_version: i64,
}

impl Record for Customer {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            row_version: row.get("row_version")?,
        })
    }
}

impl Entity for Customer {
    const TABLE: &'static str = "customers";
    const KEY: &'static str = "id";
    const VERSION: Option<&'static str> = Some("row_version");

    fn key(&self) -> Option<Value> {
        self.id.map(Value::Integer)
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("name", Value::Text(self.name.clone())),
            ("email", self.email.clone().map_or(Value::Null, Value::Text)),
        ]
    }

    fn version(&self) -> i64 {
        self.row_version
    }
}

/// Customer as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDto {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub version: i64,
}

impl From<Customer> for CustomerDto {
    fn from(c: Customer) -> Self {
        Self {
            id: c.id.unwrap_or_default(),
            name: c.name,
            email: c.email,
            version: c.row_version,
        }
    }
}
