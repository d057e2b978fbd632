//! Parameterized SQL statement builder
//!
//! Statements are described as tagged variants addressing a dotted Odoo
//! model name (`ir.mail_server` maps to table `ir_mail_server`). Each
//! variant carries exactly the pieces its operation needs, so malformed
//! calls are unrepresentable. Identifiers always pass through
//! [`quote_ident`] and values are always bound as parameters; raw values
//! are never concatenated into SQL text.
//!
//! `UpdateAll` touches every row of its table. That is intentional for the
//! singleton/config-style tables this tool mutates, and the variant name
//! exists precisely so the blast radius is visible at the call site.

use tokio_postgres::types::ToSql;

static NULL_PARAM: Option<String> = None;

/// A typed SQL literal, also used as the cell type of result rows.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Int(i64),
    Bool(bool),
    Null,
}

impl SqlValue {
    /// Borrow as a driver parameter.
    pub(crate) fn as_param(&self) -> &(dyn ToSql + Sync) {
        match self {
            SqlValue::Text(v) => v,
            SqlValue::Int(v) => v,
            SqlValue::Bool(v) => v,
            SqlValue::Null => &NULL_PARAM,
        }
    }
}

impl From<&str> for SqlValue {
    fn from(value: &str) -> Self {
        SqlValue::Text(value.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(value: String) -> Self {
        SqlValue::Text(value)
    }
}

impl From<i64> for SqlValue {
    fn from(value: i64) -> Self {
        SqlValue::Int(value)
    }
}

impl From<bool> for SqlValue {
    fn from(value: bool) -> Self {
        SqlValue::Bool(value)
    }
}

/// One mutation or query against a named business object.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Insert-or-update keyed on a unique column.
    Upsert {
        model: String,
        key_col: String,
        key_val: SqlValue,
        set_col: String,
        set_val: SqlValue,
    },
    /// Unconditional update of every row in the table.
    UpdateAll {
        model: String,
        set_col: String,
        set_val: SqlValue,
    },
    /// Named-column projection with an optional equality filter.
    Select {
        model: String,
        columns: Vec<String>,
        filter: Option<(String, SqlValue)>,
    },
}

/// A statement string plus its bound parameters, ready for the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltStatement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl BuiltStatement {
    pub(crate) fn param_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params.iter().map(SqlValue::as_param).collect()
    }
}

impl Statement {
    pub fn upsert(
        model: impl Into<String>,
        key_col: impl Into<String>,
        key_val: impl Into<SqlValue>,
        set_col: impl Into<String>,
        set_val: impl Into<SqlValue>,
    ) -> Self {
        Statement::Upsert {
            model: model.into(),
            key_col: key_col.into(),
            key_val: key_val.into(),
            set_col: set_col.into(),
            set_val: set_val.into(),
        }
    }

    pub fn update_all(
        model: impl Into<String>,
        set_col: impl Into<String>,
        set_val: impl Into<SqlValue>,
    ) -> Self {
        Statement::UpdateAll {
            model: model.into(),
            set_col: set_col.into(),
            set_val: set_val.into(),
        }
    }

    pub fn select<C: Into<String>>(
        model: impl Into<String>,
        columns: impl IntoIterator<Item = C>,
        filter: Option<(impl Into<String>, impl Into<SqlValue>)>,
    ) -> Self {
        Statement::Select {
            model: model.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            filter: filter.map(|(col, val)| (col.into(), val.into())),
        }
    }

    /// Render to SQL text plus bound parameters.
    pub fn build(&self) -> BuiltStatement {
        let mut params = ParamList::default();
        let sql = match self {
            Statement::Upsert {
                model,
                key_col,
                key_val,
                set_col,
                set_val,
            } => {
                let key_placeholder = params.push(key_val.clone());
                let set_placeholder = params.push(set_val.clone());
                format!(
                    "INSERT INTO {table} ({key}, {set}) VALUES ({key_placeholder}, {set_placeholder}) \
                     ON CONFLICT ({key}) DO UPDATE SET {set} = EXCLUDED.{set}",
                    table = quote_ident(&table_name(model)),
                    key = quote_ident(key_col),
                    set = quote_ident(set_col),
                )
            }
            Statement::UpdateAll {
                model,
                set_col,
                set_val,
            } => {
                let placeholder = params.push(set_val.clone());
                format!(
                    "UPDATE {table} SET {set} = {placeholder}",
                    table = quote_ident(&table_name(model)),
                    set = quote_ident(set_col),
                )
            }
            Statement::Select {
                model,
                columns,
                filter,
            } => {
                let projection = columns
                    .iter()
                    .map(|col| quote_ident(col))
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut sql = format!(
                    "SELECT {projection} FROM {table}",
                    table = quote_ident(&table_name(model)),
                );
                if let Some((col, val)) = filter {
                    if matches!(val, SqlValue::Null) {
                        sql.push_str(&format!(" WHERE {} IS NULL", quote_ident(col)));
                    } else {
                        let placeholder = params.push(val.clone());
                        sql.push_str(&format!(" WHERE {} = {placeholder}", quote_ident(col)));
                    }
                }
                sql
            }
        };
        BuiltStatement {
            sql,
            params: params.into_inner(),
        }
    }
}

/// Allocates `$n` placeholders; a `Null` renders as the `NULL` keyword
/// instead of a bound parameter, because parameter type inference cannot
/// see through a typed null when clearing columns of differing types.
#[derive(Debug, Default)]
struct ParamList {
    params: Vec<SqlValue>,
}

impl ParamList {
    fn push(&mut self, value: SqlValue) -> String {
        if matches!(value, SqlValue::Null) {
            return "NULL".to_string();
        }
        self.params.push(value);
        format!("${}", self.params.len())
    }

    fn into_inner(self) -> Vec<SqlValue> {
        self.params
    }
}

/// Map a dotted model name to its storage table.
fn table_name(model: &str) -> String {
    model.replace('.', "_")
}

/// Double-quote an identifier, doubling any embedded quotes.
fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

// =============================================================================
// TESTS
// =============================================================================
