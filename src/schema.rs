//! Destination table definitions
//!
//! Each landed table is created with every cast column typed as TEXT; the
//! loader converts them after the bulk copy. Column order matches the
//! spreadsheet exports.

use std::fmt;

/// Final type of a column that lands as text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastType {
    /// `TIMESTAMPTZ`
    Timestamptz,
    /// `UUID`
    Uuid,
}

impl CastType {
    /// SQL type name
    #[must_use]
    pub const fn sql(self) -> &'static str {
        match self {
            Self::Timestamptz => "TIMESTAMPTZ",
            Self::Uuid => "UUID",
        }
    }
}

/// SQL type a column is created with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// `BIGINT`
    BigInt,
    /// `TEXT`
    Text,
    /// `BOOLEAN`
    Boolean,
    /// Created as TEXT, converted after load
    CastLater(CastType),
}

impl ColumnType {
    /// Type used in `CREATE TABLE`
    #[must_use]
    pub const fn create_sql(self) -> &'static str {
        match self {
            Self::BigInt => "BIGINT",
            Self::Text | Self::CastLater(_) => "TEXT",
            Self::Boolean => "BOOLEAN",
        }
    }
}

/// A column of a landed table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    /// Header name in the export
    pub name: &'static str,
    /// Type at creation
    pub ty: ColumnType,
}

const fn col(name: &'static str, ty: ColumnType) -> Column {
    Column { name, ty }
}

/// A landed table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDef {
    /// Unqualified table name
    pub name: &'static str,
    /// Columns in export order
    pub columns: &'static [Column],
}

impl TableDef {
    /// Look up a column by name
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Columns converted after load, in declaration order
    pub fn cast_columns(&self) -> impl Iterator<Item = (&'static str, CastType)> + '_ {
        self.columns.iter().filter_map(|c| match c.ty {
            ColumnType::CastLater(cast) => Some((c.name, cast)),
            _ => None,
        })
    }
}

impl fmt::Display for TableDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Messages table schema
pub mod messages {
    use super::{col, CastType, Column, ColumnType, TableDef};

    /// Table name
    pub const TABLE: &str = "messages";
    /// Provider-side message id
    pub const ID: &str = "id";
    /// `inbound` or `outbound`
    /// `inbound` or `outbound`
    pub const DIRECTION: &str = "direction";
    /// Message UUID
    pub const UUID: &str = "uuid";

    const COLUMNS: &[Column] = &[
        col(ID, ColumnType::BigInt),
        col("message_type", ColumnType::Text),
        col("masked_addressees", ColumnType::Text),
        col("masked_author", ColumnType::Text),
        col("content", ColumnType::Text),
        col("author_type", ColumnType::Text),
        col(DIRECTION, ColumnType::Text),
        col("external_id", ColumnType::Text),
        col("external_timestamp", ColumnType::CastLater(CastType::Timestamptz)),
        col("masked_from_addr", ColumnType::Text),
        col("is_deleted", ColumnType::Boolean),
        col("last_status", ColumnType::Text),
        col("last_status_timestamp", ColumnType::CastLater(CastType::Timestamptz)),
        col("rendered_content", ColumnType::Text),
        col("source_type", ColumnType::Text),
        col(UUID, ColumnType::CastLater(CastType::Uuid)),
        col("inserted_at", ColumnType::CastLater(CastType::Timestamptz)),
        col("updated_at", ColumnType::CastLater(CastType::Timestamptz)),
    ];

    /// Full definition
    pub const DEF: TableDef = TableDef {
        name: TABLE,
        columns: COLUMNS,
    };
}

/// Statuses table schema
pub mod statuses {
    use super::{col, CastType, Column, ColumnType, TableDef};

    /// Table name
    pub const TABLE: &str = "statuses";

    const COLUMNS: &[Column] = &[
        col("id", ColumnType::BigInt),
        col("status", ColumnType::Text),
        col("timestamp", ColumnType::CastLater(CastType::Timestamptz)),
        col("uuid", ColumnType::CastLater(CastType::Uuid)),
        col("message_uuid", ColumnType::CastLater(CastType::Uuid)),
        col("message_id", ColumnType::BigInt),
        col("number_id", ColumnType::BigInt),
        col("inserted_at", ColumnType::CastLater(CastType::Timestamptz)),
        col("updated_at", ColumnType::CastLater(CastType::Timestamptz)),
    ];

    /// Full definition
    pub const DEF: TableDef = TableDef {
        name: TABLE,
        columns: COLUMNS,
    };
}

/// Columns of the dbt view the reports read
pub mod message_status_history {
    /// Message creation time
    pub const MESSAGE_CREATED_AT: &str = "message_created_at";
    /// Pseudonymised sender
    pub const MASKED_SENDER: &str = "masked_sender";
    /// Pseudonymised recipients
    pub const MASKED_ADDRESSEES: &str = "masked_addressees";
    pub const DIRECTION: &str = "direction";
    /// Sent status time
    pub const SENT_AT: &str = "sent_at";
    /// Delivered status time
    pub const DELIVERED_AT: &str = "delivered_at";
    /// Read status time
    pub const READ_AT: &str = "read_at";
    /// Failed status time
    pub const FAILED_AT: &str = "failed_at";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_cast_columns() {
        let casts: Vec<_> = messages::DEF.cast_columns().collect();
        assert_eq!(
            casts,
            vec![
                ("external_timestamp", CastType::Timestamptz),
                ("last_status_timestamp", CastType::Timestamptz),
                ("uuid", CastType::Uuid),
                ("inserted_at", CastType::Timestamptz),
                ("updated_at", CastType::Timestamptz),
            ]
        );
    }

    #[test]
    fn test_statuses_cast_columns() {
        let casts: Vec<_> = statuses::DEF.cast_columns().map(|(name, _)| name).collect();
        assert_eq!(casts, vec!["timestamp", "uuid", "message_uuid", "inserted_at", "updated_at"]);
    }

    #[test]
    fn test_cast_columns_are_created_as_text() {
        for def in [messages::DEF, statuses::DEF] {
            for (name, _) in def.cast_columns() {
                let column = def.column(name).unwrap();
                assert_eq!(column.ty.create_sql(), "TEXT", "{def}.{name}");
            }
        }
    }

    #[test]
    fn test_column_names_are_valid_identifiers() {
        for def in [messages::DEF, statuses::DEF] {
            for column in def.columns {
                crate::validation::InputValidator::validate_identifier(column.name).unwrap();
            }
        }
    }
}
