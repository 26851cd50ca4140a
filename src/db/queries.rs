use std::str::FromStr;

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{ts_from_sql, ts_to_sql};
use crate::error::{AppError, Result};
use crate::models::{Activation, Customer, LicenseStatus};

const CUSTOMER_COLS: &str =
    "id, name, email, license_key, status, banned, max_devices, created_at, expires_at";
const ACTIVATION_COLS: &str = "device_id, activated_at, last_seen_at";

fn ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<chrono::DateTime<chrono::Utc>> {
    let raw: String = row.get(idx)?;
    ts_from_sql(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn customer_from_row(row: &Row<'_>) -> rusqlite::Result<Customer> {
    let status_raw: String = row.get(4)?;
    let status = LicenseStatus::from_str(&status_raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?;

    Ok(Customer {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        license_key: row.get(3)?,
        status,
        banned: row.get(5)?,
        max_devices: row.get(6)?,
        created_at: ts_col(row, 7)?,
        expires_at: ts_col(row, 8)?,
        activations: Vec::new(),
    })
}

fn activation_from_row(row: &Row<'_>) -> rusqlite::Result<Activation> {
    Ok(Activation {
        device_id: row.get(0)?,
        activated_at: ts_col(row, 1)?,
        last_seen_at: ts_col(row, 2)?,
    })
}

fn activations_for(conn: &Connection, customer_id: &str) -> Result<Vec<Activation>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM activations WHERE customer_id = ?1 ORDER BY seq",
        ACTIVATION_COLS
    ))?;
    let rows = stmt.query_map(params![customer_id], activation_from_row)?;
    rows.collect::<rusqlite::Result<Vec<_>>>().map_err(Into::into)
}

fn load_activations(conn: &Connection, customer: Option<Customer>) -> Result<Option<Customer>> {
    match customer {
        Some(mut c) => {
            c.activations = activations_for(conn, &c.id)?;
            Ok(Some(c))
        }
        None => Ok(None),
    }
}

// ============ Customers ============

/// Insert a freshly issued record. The activation set starts empty.
pub fn insert_customer(conn: &Connection, customer: &Customer) -> Result<()> {
    conn.execute(
        &format!("INSERT INTO customers ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)", CUSTOMER_COLS),
        params![
            &customer.id,
            &customer.name,
            &customer.email,
            &customer.license_key,
            customer.status.as_ref(),
            customer.banned,
            customer.max_devices,
            ts_to_sql(&customer.created_at),
            ts_to_sql(&customer.expires_at),
        ],
    )?;
    Ok(())
}

/// True when an insert failed because the generated license key already
/// exists; the caller regenerates and retries.
pub fn is_license_key_collision(err: &AppError) -> bool {
    matches!(
        err,
        AppError::Database(rusqlite::Error::SqliteFailure(e, Some(msg)))
            if e.code == rusqlite::ErrorCode::ConstraintViolation && msg.contains("license_key")
    )
}

pub fn get_customer_by_id(conn: &Connection, id: &str) -> Result<Option<Customer>> {
    let customer = conn
        .query_row(
            &format!("SELECT {} FROM customers WHERE id = ?1", CUSTOMER_COLS),
            params![id],
            customer_from_row,
        )
        .optional()?;
    load_activations(conn, customer)
}

pub fn get_customer_by_key(conn: &Connection, license_key: &str) -> Result<Option<Customer>> {
    let customer = conn
        .query_row(
            &format!(
                "SELECT {} FROM customers WHERE license_key = ?1",
                CUSTOMER_COLS
            ),
            params![license_key],
            customer_from_row,
        )
        .optional()?;
    load_activations(conn, customer)
}

pub fn list_customers(conn: &Connection) -> Result<Vec<Customer>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM customers ORDER BY created_at DESC",
        CUSTOMER_COLS
    ))?;
    let rows = stmt.query_map([], customer_from_row)?;
    let mut customers = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    for customer in &mut customers {
        customer.activations = activations_for(conn, &customer.id)?;
    }
    Ok(customers)
}

/// Write back the mutable state a transition may have changed: status, ban
/// flag, and expiry. Identity fields and `created_at` never move.
pub fn update_customer_state(conn: &Connection, customer: &Customer) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE customers SET status = ?1, banned = ?2, expires_at = ?3 WHERE id = ?4",
        params![
            customer.status.as_ref(),
            customer.banned,
            ts_to_sql(&customer.expires_at),
            &customer.id,
        ],
    )?;
    Ok(affected > 0)
}

// ============ Activations ============

/// Create the activation on first sight of a device, or bump its
/// `last_seen_at` on re-activation. `activated_at` is write-once.
pub fn upsert_activation(conn: &Connection, customer_id: &str, activation: &Activation) -> Result<()> {
    conn.execute(
        "INSERT INTO activations (customer_id, device_id, activated_at, last_seen_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (customer_id, device_id)
         DO UPDATE SET last_seen_at = excluded.last_seen_at",
        params![
            customer_id,
            &activation.device_id,
            ts_to_sql(&activation.activated_at),
            ts_to_sql(&activation.last_seen_at),
        ],
    )?;
    Ok(())
}
