use std::collections::HashSet;
use std::fmt::Write;

use shiftform_core::schema::{Field, FieldKind, PAYLOAD_COLUMN, RESERVED_COLUMNS, column_name};

/// Roles granted open row-level access on every report table.
pub const POLICY_ROLES: [&str; 2] = ["anon", "authenticated"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Uuid,
    Text,
    Numeric,
    Boolean,
    Date,
    Timestamptz,
    Jsonb,
}

impl ColumnType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Uuid => "uuid",
            Self::Text => "text",
            Self::Numeric => "numeric",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Timestamptz => "timestamptz",
            Self::Jsonb => "jsonb",
        }
    }

    pub fn for_field(kind: &FieldKind) -> Self {
        match kind {
            FieldKind::Number => Self::Numeric,
            FieldKind::Checkbox => Self::Boolean,
            FieldKind::Matrix(_) | FieldKind::RepeatableList(_) | FieldKind::TimePair(_) | FieldKind::Attendance => {
                Self::Jsonb
            }
            FieldKind::Text
            | FieldKind::Date
            | FieldKind::Time
            | FieldKind::Select { .. }
            | FieldKind::Textarea
            | FieldKind::Container => Self::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
    pub not_null: bool,
    pub default: Option<String>,
    pub primary_key: bool,
    /// Field key this column stores; `None` for the fixed columns.
    pub source_key: Option<String>,
}

impl Column {
    fn fixed(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            not_null: false,
            default: None,
            primary_key: false,
            source_key: None,
        }
    }

    fn with_default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }

    fn not_null(mut self, default: &str) -> Self {
        self.not_null = true;
        self.with_default(default)
    }

    fn render(&self) -> String {
        let mut sql = if self.source_key.is_some() {
            format!("\"{}\" {}", self.name, self.column_type.as_sql())
        } else {
            format!("{} {}", self.name, self.column_type.as_sql())
        };
        if self.primary_key {
            sql.push_str(" primary key");
        }
        if self.not_null {
            sql.push_str(" not null");
        }
        if let Some(default) = &self.default {
            let _ = write!(sql, " default {default}");
        }
        sql
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub name: String,
    pub column: String,
}

/// A field whose column was not emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedField {
    pub key: String,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    pub table: String,
    pub title: String,
    pub columns: Vec<Column>,
    pub indexes: Vec<Index>,
    pub skipped: Vec<SkippedField>,
}

pub fn table_name(slug: &str) -> String {
    let slug = column_name(slug);
    if slug.is_empty() {
        "report_form".to_string()
    } else {
        format!("report_{slug}")
    }
}

/// Maps a field list to a report table. Every table has an identity column,
/// a catch-all `data` payload and indexed date/creation columns. A field
/// whose column name is empty, reserved, or already emitted is skipped;
/// the first field to claim a column keeps it.
pub fn synthesize(slug: &str, title: &str, fields: &[Field]) -> TableDefinition {
    let table = table_name(slug);
    let mut id = Column::fixed("id", ColumnType::Uuid).with_default("gen_random_uuid()");
    id.primary_key = true;

    let mut columns = vec![
        id,
        Column::fixed("tracking_code", ColumnType::Text),
        Column::fixed("report_date", ColumnType::Date),
        Column::fixed(PAYLOAD_COLUMN, ColumnType::Jsonb).not_null("'{}'::jsonb"),
        Column::fixed("created_at", ColumnType::Timestamptz).not_null("now()"),
        Column::fixed("updated_at", ColumnType::Timestamptz).not_null("now()"),
    ];

    let mut taken: HashSet<String> = RESERVED_COLUMNS.iter().map(|c| c.to_string()).collect();
    taken.insert(PAYLOAD_COLUMN.to_string());
    let mut skipped = Vec::new();

    for field in fields {
        let column = column_name(&field.key);
        if column.is_empty() || !taken.insert(column.clone()) {
            if !field.is_blank() {
                tracing::warn!(table = %table, key = %field.key, column = %column, "skipping field column");
                skipped.push(SkippedField {
                    key: field.key.clone(),
                    column,
                });
            }
            continue;
        }
        let column_type = ColumnType::for_field(&field.kind);
        let default = match column_type {
            ColumnType::Boolean => Some("false".to_string()),
            ColumnType::Jsonb => Some("'{}'::jsonb".to_string()),
            _ => None,
        };
        columns.push(Column {
            name: column,
            column_type,
            not_null: false,
            default,
            primary_key: false,
            source_key: Some(field.key.clone()),
        });
    }

    let indexes = ["report_date", "created_at"]
        .iter()
        .map(|column| Index {
            name: format!("{table}_{column}_idx"),
            column: column.to_string(),
        })
        .collect();

    TableDefinition {
        table,
        title: title.to_string(),
        columns,
        indexes,
        skipped,
    }
}

impl TableDefinition {
    pub fn qualified_name(&self) -> String {
        format!("public.{}", self.table)
    }

    pub fn field_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|c| c.source_key.is_some())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// PostgreSQL DDL. Safe to run repeatedly.
    pub fn to_sql(&self) -> String {
        let name = self.qualified_name();
        let mut sql = String::new();

        let body = self
            .columns
            .iter()
            .map(|c| format!("  {}", c.render()))
            .collect::<Vec<_>>()
            .join(",\n");
        let _ = writeln!(sql, "create table if not exists {name} (\n{body}\n);");
        let _ = writeln!(sql, "comment on table {name} is '{}';", self.title.replace('\'', "''"));

        for index in &self.indexes {
            let _ = writeln!(
                sql,
                "create index if not exists {} on {name} ({});",
                index.name, index.column
            );
        }

        let _ = writeln!(sql, "alter table {name} enable row level security;");
        for role in POLICY_ROLES {
            let policy = format!("{}_{role}_all", self.table);
            let _ = writeln!(sql, "drop policy if exists \"{policy}\" on {name};");
            let _ = writeln!(
                sql,
                "create policy \"{policy}\" on {name} for all to {role} using (true) with check (true);"
            );
        }
        sql
    }
}
