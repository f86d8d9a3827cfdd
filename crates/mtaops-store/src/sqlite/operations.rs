//! SQLite operation store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Row};
use tokio_rusqlite::Connection;

use mtaops_protocols::error::StoreError;
use mtaops_protocols::operation::{Operation, OperationFilter, OperationOrder, OperationState};
use mtaops_protocols::store::OperationStore;

use super::{fmt_time, parse_enum, parse_time, placeholders, query_error};

const COLUMNS: &str = "process_id, process_type, state, space_id, mta_id, namespace, \
                       started_at, ended_at, user, has_acquired_lock, cleaned_up";

/// Operation rows in the `operations` table.
///
/// Lock and state changes are single `UPDATE ... WHERE` statements, so the
/// row count tells whether this caller won.
pub struct SqliteOperationStore {
    conn: Connection,
}

impl SqliteOperationStore {
    pub(crate) fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

fn row_to_operation(row: &Row<'_>) -> rusqlite::Result<Operation> {
    let process_type: String = row.get(1)?;
    let state: String = row.get(2)?;
    let started_at: String = row.get(6)?;
    let ended_at: Option<String> = row.get(7)?;

    Ok(Operation {
        process_id: row.get(0)?,
        process_type: parse_enum(1, &process_type)?,
        state: parse_enum(2, &state)?,
        space_id: row.get(3)?,
        mta_id: row.get(4)?,
        namespace: row.get(5)?,
        started_at: parse_time(6, &started_at)?,
        ended_at: ended_at.map(|t| parse_time(7, &t)).transpose()?,
        user: row.get(8)?,
        has_acquired_lock: row.get(9)?,
        cleaned_up: row.get(10)?,
    })
}

/// Translate a filter into a `WHERE` clause and its positional parameters.
fn where_clause(filter: &OperationFilter) -> (String, Vec<Value>) {
    let mut conditions: Vec<String> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    let mut text_eq = |column: &str, value: &Option<String>| {
        if let Some(v) = value {
            conditions.push(format!("{} = ?", column));
            params.push(Value::Text(v.clone()));
        }
    };
    text_eq("process_id", &filter.process_id);
    text_eq("process_type", &filter.process_type.map(|t| t.as_str().to_string()));
    text_eq("space_id", &filter.space_id);
    text_eq("mta_id", &filter.mta_id);
    text_eq("namespace", &filter.namespace);
    text_eq("user", &filter.user);

    if let Some(locked) = filter.acquired_lock {
        conditions.push("has_acquired_lock = ?".to_string());
        params.push(Value::Integer(locked as i64));
    }
    if let Some(cleaned) = filter.cleaned_up {
        conditions.push("cleaned_up = ?".to_string());
        params.push(Value::Integer(cleaned as i64));
    }
    if !filter.states.is_empty() {
        conditions.push(format!("state IN ({})", placeholders(filter.states.len())));
        params.extend(filter.states.iter().map(|s| Value::Text(s.as_str().to_string())));
    }
    if let Some(t) = filter.started_before {
        conditions.push("started_at < ?".to_string());
        params.push(Value::Text(fmt_time(&t)));
    }
    if let Some(t) = filter.started_after {
        conditions.push("started_at > ?".to_string());
        params.push(Value::Text(fmt_time(&t)));
    }
    if let Some(t) = filter.ended_before {
        conditions.push("ended_at IS NOT NULL AND ended_at < ?".to_string());
        params.push(Value::Text(fmt_time(&t)));
    }

    if conditions.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), params)
    }
}

fn order_and_paging(filter: &OperationFilter) -> String {
    let order = match filter.order {
        OperationOrder::ProcessIdAsc => "process_id ASC",
        OperationOrder::StartedAtAsc => "started_at ASC, process_id ASC",
        OperationOrder::StartedAtDesc => "started_at DESC, process_id ASC",
    };
    let mut sql = format!(" ORDER BY {}", order);
    match (filter.limit, filter.offset) {
        (Some(limit), offset) => sql.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset.unwrap_or(0))),
        (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {}", offset)),
        (None, None) => {}
    }
    sql
}

#[async_trait]
impl OperationStore for SqliteOperationStore {
    async fn insert(&self, operation: &Operation) -> Result<(), StoreError> {
        let op = operation.clone();
        let process_id = op.process_id.clone();
        let inserted = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    &format!(
                        "INSERT OR IGNORE INTO operations ({}) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                        COLUMNS
                    ),
                    params![
                        op.process_id,
                        op.process_type.as_str(),
                        op.state.as_str(),
                        op.space_id,
                        op.mta_id,
                        op.namespace,
                        fmt_time(&op.started_at),
                        op.ended_at.as_ref().map(fmt_time),
                        op.user,
                        op.has_acquired_lock,
                        op.cleaned_up,
                    ],
                )?;
                Ok(changed == 1)
            })
            .await
            .map_err(query_error)?;

        if inserted {
            Ok(())
        } else {
            Err(StoreError::Duplicate(process_id))
        }
    }

    async fn get(&self, process_id: &str) -> Result<Option<Operation>, StoreError> {
        let process_id = process_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {} FROM operations WHERE process_id = ?1",
                    COLUMNS
                ))?;
                let mut rows = stmt.query_map([&process_id], row_to_operation)?;
                let op = rows.next().transpose()?;
                Ok(op)
            })
            .await
            .map_err(query_error)
    }

    async fn update(&self, operation: &Operation) -> Result<(), StoreError> {
        let op = operation.clone();
        let process_id = op.process_id.clone();
        let changed = self
            .conn
            .call(move |conn| {
                Ok(conn.execute(
                    "UPDATE operations SET process_type = ?2, state = ?3, space_id = ?4, mta_id = ?5,
                         namespace = ?6, started_at = ?7, ended_at = ?8, user = ?9,
                         has_acquired_lock = ?10, cleaned_up = ?11
                     WHERE process_id = ?1",
                    params![
                        op.process_id,
                        op.process_type.as_str(),
                        op.state.as_str(),
                        op.space_id,
                        op.mta_id,
                        op.namespace,
                        fmt_time(&op.started_at),
                        op.ended_at.as_ref().map(fmt_time),
                        op.user,
                        op.has_acquired_lock,
                        op.cleaned_up,
                    ],
                )?)
            })
            .await
            .map_err(query_error)?;

        if changed == 0 {
            return Err(StoreError::NotFound(process_id));
        }
        Ok(())
    }

    async fn query(&self, filter: &OperationFilter) -> Result<Vec<Operation>, StoreError> {
        let (where_sql, params) = where_clause(filter);
        let sql = format!(
            "SELECT {} FROM operations{}{}",
            COLUMNS,
            where_sql,
            order_and_paging(filter)
        );
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let ops = stmt
                    .query_map(params_from_iter(params), row_to_operation)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ops)
            })
            .await
            .map_err(query_error)
    }

    async fn count(&self, filter: &OperationFilter) -> Result<usize, StoreError> {
        let (where_sql, params) = where_clause(filter);
        let sql = format!("SELECT COUNT(*) FROM operations{}", where_sql);
        self.conn
            .call(move |conn| {
                let count: i64 = conn.query_row(&sql, params_from_iter(params), |row| row.get(0))?;
                Ok(count as usize)
            })
            .await
            .map_err(query_error)
    }

    async fn delete(&self, filter: &OperationFilter) -> Result<usize, StoreError> {
        let (where_sql, params) = where_clause(filter);
        let sql = format!("DELETE FROM operations{}", where_sql);
        self.conn
            .call(move |conn| Ok(conn.execute(&sql, params_from_iter(params))?))
            .await
            .map_err(query_error)
    }

    async fn compare_and_set_lock(
        &self,
        process_id: &str,
        expected: bool,
        new: bool,
    ) -> Result<bool, StoreError> {
        let process_id = process_id.to_string();
        self.conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE operations SET has_acquired_lock = ?3
                     WHERE process_id = ?1 AND has_acquired_lock = ?2",
                    params![process_id, expected, new],
                )?;
                Ok(changed == 1)
            })
            .await
            .map_err(query_error)
    }

    async fn transition_state(
        &self,
        process_id: &str,
        from: &[OperationState],
        to: OperationState,
        ended_at: Option<DateTime<Utc>>,
    ) -> Result<bool, StoreError> {
        if from.is_empty() {
            return Ok(false);
        }
        let mut params: Vec<Value> = vec![
            Value::Text(to.as_str().to_string()),
            match ended_at {
                Some(t) => Value::Text(fmt_time(&t)),
                None => Value::Null,
            },
            Value::Text(process_id.to_string()),
        ];
        params.extend(from.iter().map(|s| Value::Text(s.as_str().to_string())));
        let sql = format!(
            "UPDATE operations SET state = ?, ended_at = COALESCE(?, ended_at)
             WHERE process_id = ? AND state IN ({})",
            placeholders(from.len())
        );

        self.conn
            .call(move |conn| Ok(conn.execute(&sql, params_from_iter(params))? == 1))
            .await
            .map_err(query_error)
    }

    async fn mark_cleaned_up(&self, process_id: &str) -> Result<bool, StoreError> {
        let process_id = process_id.to_string();
        self.conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE operations SET cleaned_up = 1 WHERE process_id = ?1 AND cleaned_up = 0",
                    [&process_id],
                )?;
                Ok(changed == 1)
            })
            .await
            .map_err(query_error)
    }
}
