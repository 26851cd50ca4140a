use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LicenseStatus {
    Active,
    Expired,
    Banned,
}

/// One device bound to a license.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activation {
    /// Caller-supplied opaque identifier, unique within its license.
    pub device_id: String,
    /// Set at first activation, never changed afterwards.
    pub activated_at: DateTime<Utc>,
    /// Bumped on every successful activate or verify for this device.
    pub last_seen_at: DateTime<Utc>,
}

/// A customer's entitlement record, 1:1 with a license key.
///
/// `status` is a cached value: the ban flag and `expires_at` are the source
/// of truth, and every state-changing operation recomputes it before
/// persisting. `banned` overrides expiry until explicitly cleared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub email: String,
    pub license_key: String,
    pub status: LicenseStatus,
    pub banned: bool,
    pub max_devices: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub activations: Vec<Activation>,
}

impl Customer {
    pub fn activation(&self, device_id: &str) -> Option<&Activation> {
        self.activations.iter().find(|a| a.device_id == device_id)
    }

    pub fn activation_mut(&mut self, device_id: &str) -> Option<&mut Activation> {
        self.activations
            .iter_mut()
            .find(|a| a.device_id == device_id)
    }
}

/// Input for issuing a new customer license. `months` and `max_devices`
/// fall back to the issue defaults when absent.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueCustomer {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub months: Option<u32>,
    #[serde(default)]
    pub max_devices: Option<u32>,
}
