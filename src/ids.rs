use std::fmt;
use std::str::FromStr;

use rusqlite::ToSql;
use rusqlite::types::{FromSql, FromSqlResult, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::CatalogError;

fn parse_positive(kind: &str, raw: &str) -> Result<i64, CatalogError> {
    let trimmed = raw.trim();
    let value: i64 = trimmed.parse().map_err(|_| {
        CatalogError::InvalidArgument(format!("{kind} id `{raw}` is not an integer"))
    })?;
    check_positive(kind, value)
}

fn check_positive(kind: &str, value: i64) -> Result<i64, CatalogError> {
    if value <= 0 {
        return Err(CatalogError::InvalidArgument(format!(
            "{kind} id must be positive, got {value}"
        )));
    }
    Ok(value)
}

macro_rules! positive_id {
    ($name:ident, $kind:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub fn new(value: i64) -> Result<Self, CatalogError> {
                check_positive($kind, value).map(Self)
            }

            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl FromStr for $name {
            type Err = CatalogError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                parse_positive($kind, raw).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.0))
            }
        }

        // Rows come from AUTOINCREMENT keys, so they are positive already.
        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                i64::column_result(value).map(Self)
            }
        }
    };
}

positive_id!(TagId, "tag");
positive_id!(RecipeId, "recipe");
