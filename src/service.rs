//! Boundary operations over the store and the state machine.
//!
//! Each mutating operation is one atomic unit: acquire the record's lock,
//! re-read inside an immediate transaction, run the transition, persist,
//! commit. Customers are never deleted, so an id resolved before taking
//! the lock stays valid under it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::TransactionBehavior;
use serde::Serialize;

use crate::clock::{Clock, SystemClock};
use crate::db::locks::KeyLocks;
use crate::db::{DbPool, queries};
use crate::error::{AppError, Result};
use crate::keygen;
use crate::license;
use crate::models::{Customer, IssueCustomer, LicenseStatus};

/// How many times issuance retries on a generated-key collision.
const KEY_COLLISION_RETRIES: u32 = 3;

#[derive(Debug, Serialize)]
pub struct ActivationGranted {
    pub status: LicenseStatus,
    pub expires_at: DateTime<Utc>,
    pub device_id: String,
    pub customer_name: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyOutcome {
    pub status: LicenseStatus,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct LicenseService {
    pool: DbPool,
    locks: KeyLocks,
    clock: Arc<dyn Clock>,
}

impl LicenseService {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            locks: KeyLocks::default(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_lock_wait(mut self, wait: Duration) -> Self {
        self.locks = KeyLocks::new(wait);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Issue a new customer license with a freshly generated key.
    pub async fn issue_customer(&self, input: IssueCustomer) -> Result<Customer> {
        let now = self.clock.now();
        let mut customer = license::issue(&input, now)?;

        let conn = self.pool.get()?;
        // Key uniqueness lives in the store; regenerate on the rare collision.
        let mut attempts = 0;
        loop {
            match queries::insert_customer(&conn, &customer) {
                Ok(()) => break,
                Err(err)
                    if queries::is_license_key_collision(&err)
                        && attempts < KEY_COLLISION_RETRIES =>
                {
                    attempts += 1;
                    customer.license_key = keygen::generate();
                }
                Err(err) => return Err(err),
            }
        }

        tracing::info!(customer_id = %customer.id, "issued license");
        Ok(customer)
    }

    /// All customer records, newest first. Statuses are recomputed in
    /// memory for display; the stored value is refreshed at the next
    /// transition on each record.
    pub async fn list_customers(&self) -> Result<Vec<Customer>> {
        let now = self.clock.now();
        let conn = self.pool.get()?;
        let mut customers = queries::list_customers(&conn)?;
        for customer in &mut customers {
            license::refresh_status(customer, now);
        }
        Ok(customers)
    }

    /// Extend a license. The new expiry is `months` past the later of now
    /// and the current expiry.
    pub async fn renew_customer(&self, id: &str, months: Option<u32>) -> Result<Customer> {
        let now = self.clock.now();
        let _guard = self.locks.acquire(id).await?;

        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut customer = queries::get_customer_by_id(&tx, id)?
            .ok_or_else(|| AppError::NotFound("Customer not found".into()))?;

        license::renew(&mut customer, months, now);
        queries::update_customer_state(&tx, &customer)?;
        tx.commit()?;

        tracing::info!(customer_id = %id, expires_at = %customer.expires_at, "renewed license");
        Ok(customer)
    }

    /// Set or clear the ban flag.
    pub async fn ban_customer(&self, id: &str, banned: bool) -> Result<Customer> {
        let now = self.clock.now();
        let _guard = self.locks.acquire(id).await?;

        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut customer = queries::get_customer_by_id(&tx, id)?
            .ok_or_else(|| AppError::NotFound("Customer not found".into()))?;

        license::set_banned(&mut customer, banned, now);
        queries::update_customer_state(&tx, &customer)?;
        tx.commit()?;

        tracing::info!(customer_id = %id, banned, "updated ban flag");
        Ok(customer)
    }

    /// Admission control for a device against a license key.
    pub async fn activate_license(
        &self,
        license_key: &str,
        device_id: &str,
    ) -> Result<ActivationGranted> {
        let now = self.clock.now();
        let device_id = device_id.trim();
        if device_id.is_empty() {
            return Err(AppError::Validation("device_id is required".into()));
        }

        let customer_id = self.resolve_key(license_key)?;
        let _guard = self.locks.acquire(&customer_id).await?;

        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut customer =
            queries::get_customer_by_id(&tx, &customer_id)?.ok_or(AppError::InvalidLicense)?;

        let decision = license::activate(&mut customer, device_id, now);
        match &decision {
            Ok(()) => {
                queries::update_customer_state(&tx, &customer)?;
                let activation = customer
                    .activation(device_id)
                    .ok_or_else(|| AppError::Internal("activation missing after admit".into()))?;
                queries::upsert_activation(&tx, &customer.id, activation)?;
            }
            // An expired refusal still persists the recomputed status.
            Err(AppError::Expired { .. }) => {
                queries::update_customer_state(&tx, &customer)?;
            }
            Err(_) => {}
        }
        tx.commit()?;
        decision?;

        tracing::debug!(customer_id = %customer.id, device_id, "activation granted");
        Ok(ActivationGranted {
            status: customer.status,
            expires_at: customer.expires_at,
            device_id: device_id.to_string(),
            customer_name: customer.name,
        })
    }

    /// Liveness check for an already-activated device.
    pub async fn verify_license(&self, license_key: &str, device_id: &str) -> Result<VerifyOutcome> {
        let now = self.clock.now();
        let customer_id = self.resolve_key(license_key)?;
        let _guard = self.locks.acquire(&customer_id).await?;

        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut customer =
            queries::get_customer_by_id(&tx, &customer_id)?.ok_or(AppError::InvalidLicense)?;

        let status = license::verify(&mut customer, device_id, now)?;
        queries::update_customer_state(&tx, &customer)?;
        let activation = customer
            .activation(device_id)
            .ok_or_else(|| AppError::Internal("activation missing after verify".into()))?;
        queries::upsert_activation(&tx, &customer.id, activation)?;
        tx.commit()?;

        tracing::debug!(customer_id = %customer.id, device_id, status = %status.as_ref(), "verified");
        Ok(VerifyOutcome {
            status,
            expires_at: customer.expires_at,
        })
    }

    fn resolve_key(&self, license_key: &str) -> Result<String> {
        let conn = self.pool.get()?;
        let customer =
            queries::get_customer_by_key(&conn, license_key)?.ok_or(AppError::InvalidLicense)?;
        Ok(customer.id)
    }
}
