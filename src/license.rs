//! License state machine.
//!
//! Every status and activation-set mutation flows through this module; the
//! store layer persists whatever these transitions decide. All functions
//! take `now` explicitly so the rules stay pure.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::expiry;
use crate::keygen;
use crate::models::{Activation, Customer, IssueCustomer, LicenseStatus};

pub const DEFAULT_TERM_MONTHS: u32 = 6;
pub const DEFAULT_RENEW_MONTHS: u32 = 3;
pub const DEFAULT_MAX_DEVICES: u32 = 2;

/// Status as a pure function of the ban flag and expiry. The ban flag
/// overrides the expiry test until explicitly cleared.
pub fn effective_status(
    banned: bool,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> LicenseStatus {
    if banned {
        LicenseStatus::Banned
    } else if expiry::is_expired(expires_at, now) {
        LicenseStatus::Expired
    } else {
        LicenseStatus::Active
    }
}

/// Recompute the cached status field on the record.
pub fn refresh_status(customer: &mut Customer, now: DateTime<Utc>) {
    customer.status = effective_status(customer.banned, customer.expires_at, now);
}

/// Build a fresh record for issuance: new id, freshly generated key, empty
/// activation set, expiry `months` from now. Fails with `Validation` when
/// name or email is blank.
pub fn issue(input: &IssueCustomer, now: DateTime<Utc>) -> Result<Customer> {
    let name = input.name.trim();
    let email = input.email.trim();
    if name.is_empty() || email.is_empty() {
        return Err(AppError::Validation("name and email are required".into()));
    }

    let months = input
        .months
        .filter(|m| *m >= 1)
        .unwrap_or(DEFAULT_TERM_MONTHS);
    let max_devices = input
        .max_devices
        .filter(|m| *m >= 1)
        .unwrap_or(DEFAULT_MAX_DEVICES);

    Ok(Customer {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        email: email.to_string(),
        license_key: keygen::generate(),
        status: LicenseStatus::Active,
        banned: false,
        max_devices,
        created_at: now,
        expires_at: expiry::add_months(now, months),
        activations: Vec::new(),
    })
}

/// Extend the expiry from the later of now and the current expiry, so
/// renewing an active license never shortens it and renewing an expired
/// one starts from now. Only `expires_at` moves; the cached status catches
/// up at the next evaluation.
pub fn renew(customer: &mut Customer, months: Option<u32>, now: DateTime<Utc>) {
    let months = months.filter(|m| *m >= 1).unwrap_or(DEFAULT_RENEW_MONTHS);
    let base = if expiry::is_expired(customer.expires_at, now) {
        now
    } else {
        customer.expires_at
    };
    customer.expires_at = expiry::add_months(base, months);
}

/// Set or clear the ban flag and recompute status. Clearing never leaves
/// the record banned; it falls through to the expiry test.
pub fn set_banned(customer: &mut Customer, banned: bool, now: DateTime<Utc>) {
    customer.banned = banned;
    refresh_status(customer, now);
}

/// Admission control: bind `device_id` to the license or refuse.
///
/// Re-activating an already-bound device is idempotent and only bumps its
/// `last_seen_at`. On an `Expired` refusal the record's status has been
/// recomputed and must still be persisted by the caller.
pub fn activate(customer: &mut Customer, device_id: &str, now: DateTime<Utc>) -> Result<()> {
    if customer.banned {
        customer.status = LicenseStatus::Banned;
        return Err(AppError::Banned);
    }
    if expiry::is_expired(customer.expires_at, now) {
        customer.status = LicenseStatus::Expired;
        return Err(AppError::Expired {
            expires_at: customer.expires_at,
        });
    }

    match customer.activation_mut(device_id) {
        Some(activation) => activation.last_seen_at = now,
        None => {
            if customer.activations.len() as u32 >= customer.max_devices {
                return Err(AppError::DeviceLimitExceeded {
                    max_devices: customer.max_devices,
                });
            }
            customer.activations.push(Activation {
                device_id: device_id.to_string(),
                activated_at: now,
                last_seen_at: now,
            });
        }
    }

    customer.status = LicenseStatus::Active;
    Ok(())
}

/// Heartbeat for an already-activated device. Never admits a new device;
/// banned and expired come back in the status, not as refusals.
pub fn verify(customer: &mut Customer, device_id: &str, now: DateTime<Utc>) -> Result<LicenseStatus> {
    let Some(activation) = customer.activation_mut(device_id) else {
        return Err(AppError::NotActivated);
    };
    activation.last_seen_at = now;
    refresh_status(customer, now);
    Ok(customer.status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn customer(max_devices: u32, expires_at: DateTime<Utc>) -> Customer {
        Customer {
            id: "c1".into(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            license_key: "LIC-TEST-TEST-TEST-TEST".into(),
            status: LicenseStatus::Active,
            banned: false,
            max_devices,
            created_at: utc("2025-01-01T00:00:00Z"),
            expires_at,
            activations: Vec::new(),
        }
    }

    #[test]
    fn issue_applies_defaults() {
        let now = utc("2025-01-01T00:00:00Z");
        let input = IssueCustomer {
            name: "Ada".into(),
            email: "ada@example.com".into(),
            months: None,
            max_devices: None,
        };
        let c = issue(&input, now).unwrap();
        assert_eq!(c.status, LicenseStatus::Active);
        assert_eq!(c.max_devices, DEFAULT_MAX_DEVICES);
        assert_eq!(c.expires_at, utc("2025-07-01T00:00:00Z"));
        assert!(c.activations.is_empty());
        assert!(c.license_key.starts_with("LIC-"));
    }

    #[test]
    fn issue_rejects_blank_name_or_email() {
        let now = utc("2025-01-01T00:00:00Z");
        let input = IssueCustomer {
            name: "  ".into(),
            email: "ada@example.com".into(),
            months: None,
            max_devices: None,
        };
        assert!(matches!(
            issue(&input, now),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn activate_admits_up_to_the_limit() {
        let now = utc("2025-01-01T00:00:00Z");
        let mut c = customer(2, utc("2026-01-01T00:00:00Z"));

        activate(&mut c, "dev1", now).unwrap();
        activate(&mut c, "dev2", now).unwrap();
        let err = activate(&mut c, "dev3", now).unwrap_err();
        assert!(matches!(err, AppError::DeviceLimitExceeded { max_devices: 2 }));
        assert_eq!(c.activations.len(), 2);
    }

    #[test]
    fn reactivation_is_idempotent() {
        let t0 = utc("2025-01-01T00:00:00Z");
        let t1 = t0 + Duration::hours(1);
        let mut c = customer(1, utc("2026-01-01T00:00:00Z"));

        activate(&mut c, "dev1", t0).unwrap();
        activate(&mut c, "dev1", t1).unwrap();

        assert_eq!(c.activations.len(), 1);
        assert_eq!(c.activations[0].activated_at, t0);
        assert_eq!(c.activations[0].last_seen_at, t1);
    }

    #[test]
    fn activate_refuses_banned_before_expiry_check() {
        let now = utc("2025-01-01T00:00:00Z");
        // Banned and already expired: the ban wins.
        let mut c = customer(2, utc("2024-01-01T00:00:00Z"));
        c.banned = true;

        assert!(matches!(activate(&mut c, "dev1", now), Err(AppError::Banned)));
        assert_eq!(c.status, LicenseStatus::Banned);
        assert!(c.activations.is_empty());
    }

    #[test]
    fn activate_on_expired_recomputes_status() {
        let now = utc("2025-06-01T00:00:00Z");
        let expires = utc("2025-05-01T00:00:00Z");
        let mut c = customer(2, expires);

        let err = activate(&mut c, "dev1", now).unwrap_err();
        assert!(matches!(err, AppError::Expired { expires_at } if expires_at == expires));
        assert_eq!(c.status, LicenseStatus::Expired);
        assert!(c.activations.is_empty());
    }

    #[test]
    fn renew_extends_from_current_expiry_when_active() {
        let now = utc("2025-01-01T00:00:00Z");
        let mut c = customer(2, utc("2025-03-01T00:00:00Z"));

        renew(&mut c, Some(1), now);
        assert_eq!(c.expires_at, utc("2025-04-01T00:00:00Z"));
    }

    #[test]
    fn renew_extends_from_now_when_expired() {
        let now = utc("2025-06-15T00:00:00Z");
        let mut c = customer(2, utc("2025-01-01T00:00:00Z"));

        renew(&mut c, Some(2), now);
        assert_eq!(c.expires_at, utc("2025-08-15T00:00:00Z"));
    }

    #[test]
    fn renew_default_is_three_months() {
        let now = utc("2025-01-01T00:00:00Z");
        let mut c = customer(2, utc("2025-02-01T00:00:00Z"));

        renew(&mut c, None, now);
        assert_eq!(c.expires_at, utc("2025-05-01T00:00:00Z"));
    }

    #[test]
    fn unban_falls_through_to_expiry_test() {
        let now = utc("2025-06-01T00:00:00Z");
        let mut c = customer(2, utc("2025-01-01T00:00:00Z"));

        set_banned(&mut c, true, now);
        assert_eq!(c.status, LicenseStatus::Banned);

        set_banned(&mut c, false, now);
        assert_eq!(c.status, LicenseStatus::Expired);

        c.expires_at = utc("2026-01-01T00:00:00Z");
        set_banned(&mut c, false, now);
        assert_eq!(c.status, LicenseStatus::Active);
    }

    #[test]
    fn verify_requires_an_activation() {
        let now = utc("2025-01-01T00:00:00Z");
        let mut c = customer(2, utc("2026-01-01T00:00:00Z"));

        assert!(matches!(
            verify(&mut c, "dev1", now),
            Err(AppError::NotActivated)
        ));
        assert!(c.activations.is_empty());
    }

    #[test]
    fn verify_reports_banned_as_status_not_error() {
        let t0 = utc("2025-01-01T00:00:00Z");
        let t1 = t0 + Duration::days(1);
        let mut c = customer(2, utc("2026-01-01T00:00:00Z"));

        activate(&mut c, "dev1", t0).unwrap();
        set_banned(&mut c, true, t0);

        let status = verify(&mut c, "dev1", t1).unwrap();
        assert_eq!(status, LicenseStatus::Banned);
        assert_eq!(c.activations[0].last_seen_at, t1);
    }

    #[test]
    fn verify_reports_expiry_after_time_passes() {
        let t0 = utc("2025-01-01T00:00:00Z");
        let mut c = customer(2, utc("2025-02-01T00:00:00Z"));

        activate(&mut c, "dev1", t0).unwrap();
        assert_eq!(verify(&mut c, "dev1", t0).unwrap(), LicenseStatus::Active);

        let later = utc("2025-02-01T00:00:00Z");
        assert_eq!(verify(&mut c, "dev1", later).unwrap(), LicenseStatus::Expired);
        assert_eq!(c.status, LicenseStatus::Expired);
    }

    #[test]
    fn ban_overrides_expiry_in_every_path() {
        let now = utc("2025-06-01T00:00:00Z");
        let expired = utc("2025-01-01T00:00:00Z");
        assert_eq!(effective_status(true, expired, now), LicenseStatus::Banned);
        assert_eq!(effective_status(false, expired, now), LicenseStatus::Expired);

        let mut c = customer(2, expired);
        activate(&mut c, "dev1", utc("2024-12-01T00:00:00Z")).unwrap();
        set_banned(&mut c, true, now);
        assert_eq!(verify(&mut c, "dev1", now).unwrap(), LicenseStatus::Banned);
    }
}
