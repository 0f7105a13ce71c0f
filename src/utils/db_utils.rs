use chrono::NaiveDate;
use sqlx::MySql;
use sqlx::mysql::MySqlArguments;
use sqlx::query::{QueryAs, QueryScalar};

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    U64(u64),
    I32(i32),
    Str(String),
    Date(NaiveDate),
}

/// ===============================
/// Dynamic WHERE clause
/// ===============================
/// Collects `AND` conditions and their values in placeholder order, so the
/// same clause can back both the COUNT and the page query of a listing.
#[derive(Debug, Clone)]
pub struct WhereClause {
    sql: String,
    values: Vec<SqlValue>,
}

impl Default for WhereClause {
    fn default() -> Self {
        Self {
            sql: String::from(" WHERE 1=1"),
            values: Vec::new(),
        }
    }
}

impl WhereClause {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `AND <condition>`; `condition` holds exactly one `?`.
    pub fn and(&mut self, condition: &str, value: SqlValue) -> &mut Self {
        self.sql.push_str(" AND ");
        self.sql.push_str(condition);
        self.values.push(value);
        self
    }

    pub fn and_opt(&mut self, condition: &str, value: Option<SqlValue>) -> &mut Self {
        if let Some(value) = value {
            self.and(condition, value);
        }
        self
    }

    /// Case-insensitive substring match on `column`.
    pub fn and_contains(&mut self, column: &str, needle: Option<&str>) -> &mut Self {
        if let Some(needle) = needle {
            let pattern = format!("%{}%", escape_like(&needle.to_lowercase()));
            self.and(&format!("LOWER({column}) LIKE ?"), SqlValue::Str(pattern));
        }
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn bind_as<'q, O>(
        &self,
        mut query: QueryAs<'q, MySql, O, MySqlArguments>,
    ) -> QueryAs<'q, MySql, O, MySqlArguments> {
        for value in self.values.iter().cloned() {
            query = match value {
                SqlValue::U64(v) => query.bind(v),
                SqlValue::I32(v) => query.bind(v),
                SqlValue::Str(v) => query.bind(v),
                SqlValue::Date(v) => query.bind(v),
            };
        }
        query
    }

    pub fn bind_scalar<'q, O>(
        &self,
        mut query: QueryScalar<'q, MySql, O, MySqlArguments>,
    ) -> QueryScalar<'q, MySql, O, MySqlArguments> {
        for value in self.values.iter().cloned() {
            query = match value {
                SqlValue::U64(v) => query.bind(v),
                SqlValue::I32(v) => query.bind(v),
                SqlValue::Str(v) => query.bind(v),
                SqlValue::Date(v) => query.bind(v),
            };
        }
        query
    }
}

fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// True only for unique-key violations (MySQL 1062). Foreign-key and
/// NOT NULL failures share SQLSTATE 23000 and are not duplicates.
pub fn is_duplicate_key(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
