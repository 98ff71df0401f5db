// system-tests/tests/helpers/entities.rs
// ============================================================================
// Module: Entities Schema
// Description: Shared-account entity table used by contention scenarios.
// Purpose: Give every worker overlapping scans on one account's key range.
// Dependencies: postgres, serial-retry-postgres
// ============================================================================

//! ## Overview
//! Every item deletes then inserts one entity row under the same account and
//! entity id. Rows are distinct per item, but the delete scans the shared
//! prefix, so concurrent serializable transactions conflict.

use postgres::types::ToSql;
use serial_retry_postgres::PostgresSession;

pub const ACCOUNT_ID: &str = "a-12345678";
pub const ENTITY_ID: &str = "c-12345678";
pub const ENTITY_KIND: &str = "TABLE";
pub const SCHEMA_NAME: &str = "test_schema";

/// Creates `accounts` and `entities`, then clears the shared account's rows.
pub fn create_schema(client: &mut postgres::Client) -> Result<(), String> {
    let statements = [
        "CREATE TABLE IF NOT EXISTS accounts (account_id STRING PRIMARY KEY)",
        "CREATE TABLE IF NOT EXISTS entities (
             account_id STRING NOT NULL REFERENCES accounts,
             entity_id STRING NOT NULL,
             entity_kind STRING NOT NULL,
             schema_name STRING,
             table_name STRING,
             column_name STRING,
             schema_table_column STRING NOT NULL AS (
                 coalesce(schema_name, '') || '/' || coalesce(table_name, '') || '/' ||
                 coalesce(column_name, '')
             ) STORED,
             PRIMARY KEY (account_id, entity_id, entity_kind, schema_table_column)
         )",
    ];
    for statement in statements {
        client.batch_execute(statement).map_err(|err| format!("schema setup failed: {err}"))?;
    }
    client
        .execute("UPSERT INTO accounts (account_id) VALUES ($1)", &[&ACCOUNT_ID])
        .map_err(|err| format!("account seed failed: {err}"))?;
    client
        .execute("DELETE FROM entities WHERE account_id = $1", &[&ACCOUNT_ID])
        .map_err(|err| format!("entity reset failed: {err}"))?;
    Ok(())
}

/// Returns the per-item table name.
pub fn table_name(item: usize) -> String {
    format!("table_{item:04}")
}

/// Deletes then re-inserts the item's entity row.
pub fn replace_entity(item: usize, session: &mut PostgresSession) -> Result<u64, postgres::Error> {
    let table = table_name(item);
    let params: [&(dyn ToSql + Sync); 5] =
        [&ACCOUNT_ID, &ENTITY_ID, &ENTITY_KIND, &SCHEMA_NAME, &table];
    let client = session.client();
    client.execute(
        "DELETE FROM entities WHERE account_id = $1 AND entity_id = $2 AND entity_kind = $3 \
         AND schema_name = $4 AND table_name = $5",
        &params,
    )?;
    client.execute(
        "INSERT INTO entities (account_id, entity_id, entity_kind, schema_name, table_name) \
         VALUES ($1, $2, $3, $4, $5)",
        &params,
    )
}

/// Counts the shared account's entity rows.
pub fn entity_count(client: &mut postgres::Client) -> Result<i64, String> {
    client
        .query_one("SELECT count(*) FROM entities WHERE account_id = $1", &[&ACCOUNT_ID])
        .and_then(|row| row.try_get(0))
        .map_err(|err| format!("entity count failed: {err}"))
}

/// Counts distinct table names among the shared account's entity rows.
pub fn distinct_tables(client: &mut postgres::Client) -> Result<i64, String> {
    client
        .query_one(
            "SELECT count(DISTINCT table_name) FROM entities WHERE account_id = $1",
            &[&ACCOUNT_ID],
        )
        .and_then(|row| row.try_get(0))
        .map_err(|err| format!("entity count failed: {err}"))
}
