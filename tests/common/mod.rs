//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use keyward::clock::ManualClock;
use keyward::db::{self, AppState, DbPool};
use keyward::models::IssueCustomer;
use keyward::service::LicenseService;

pub fn issue_input(
    name: &str,
    email: &str,
    months: Option<u32>,
    max_devices: Option<u32>,
) -> IssueCustomer {
    IssueCustomer {
        name: name.into(),
        email: email.into(),
        months,
        max_devices,
    }
}

/// File-backed pool in a temp dir so every pooled connection sees the same
/// database.
pub fn file_pool(dir: &TempDir) -> DbPool {
    let path = dir.path().join("keyward.db");
    let pool = db::open_pool(path.to_str().unwrap()).unwrap();
    {
        let conn = pool.get().unwrap();
        db::init_db(&conn).unwrap();
    }
    pool
}

pub fn test_clock() -> ManualClock {
    ManualClock::from_rfc3339("2025-01-01T00:00:00Z")
}

pub fn test_service(dir: &TempDir) -> (LicenseService, ManualClock) {
    let clock = test_clock();
    let service = LicenseService::new(file_pool(dir))
        .with_lock_wait(Duration::from_secs(2))
        .with_clock(Arc::new(clock.clone()));
    (service, clock)
}

pub const TEST_ADMIN_TOKEN: &str = "test-admin-token";

pub fn test_state(dir: &TempDir) -> (AppState, ManualClock) {
    let (service, clock) = test_service(dir);
    let state = AppState {
        service,
        admin_token: Some(TEST_ADMIN_TOKEN.into()),
    };
    (state, clock)
}
