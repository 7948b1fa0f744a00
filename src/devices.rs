use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::TableClient;
use crate::dashboard::fetch_device_ids;
use crate::error::Result;

const NAME_PREFIXES: &[&str] = &["Work", "Home", "Office", "Personal"];
const NAME_TYPES: &[&str] = &["Laptop", "Desktop", "MacBook", "PC"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Desktop,
    Laptop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Active,
    Inactive,
    Suspended,
}

/// One row of the device-management view.
///
/// Name, kind, status and last-active are fabricated deterministically from
/// the device id; the collector never reports them, and the view only
/// mutates local state (no backend write exists for devices).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    pub name: String,
    pub kind: DeviceKind,
    pub status: DeviceStatus,
    pub last_active: Option<DateTime<Utc>>,
}

fn id_hash(id: &str) -> u64 {
    id.chars().map(|c| c as u64).sum()
}

fn derive_device(id: &str, now: DateTime<Utc>) -> Device {
    let hash = id_hash(id);
    let prefix = NAME_PREFIXES[(hash % NAME_PREFIXES.len() as u64) as usize];
    let kind_name = NAME_TYPES[((hash * 13) % NAME_TYPES.len() as u64) as usize];
    let kind = if hash % 3 == 0 {
        DeviceKind::Desktop
    } else {
        DeviceKind::Laptop
    };
    let status = match (hash / 7) % 3 {
        0 => DeviceStatus::Active,
        1 => DeviceStatus::Inactive,
        _ => DeviceStatus::Suspended,
    };
    let days_ago = (hash % 14) as i64;

    Device {
        id: id.to_string(),
        name: format!("{} {}", prefix, kind_name),
        kind,
        status,
        last_active: Some(now - Duration::days(days_ago)),
    }
}

/// In-memory device list for the management view.
#[derive(Debug, Default)]
pub struct DeviceDirectory {
    devices: Vec<Device>,
}

impl DeviceDirectory {
    /// Build the directory from the distinct device ids in the log table.
    pub fn load(client: &dyn TableClient, now: DateTime<Utc>) -> Result<Self> {
        let ids = fetch_device_ids(client)?;
        Ok(Self {
            devices: ids.iter().map(|id| derive_device(id, now)).collect(),
        })
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn find(&self, id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == id)
    }

    /// Case-insensitive filter over id and display name.
    pub fn search(&self, query: &str) -> Vec<&Device> {
        let lower = query.to_lowercase();
        self.devices
            .iter()
            .filter(|d| {
                d.id.to_lowercase().contains(&lower) || d.name.to_lowercase().contains(&lower)
            })
            .collect()
    }

    /// Rename a device locally. Blank names are rejected.
    pub fn rename(&mut self, id: &str, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        match self.devices.iter_mut().find(|d| d.id == id) {
            Some(device) => {
                device.name = name.to_string();
                true
            }
            None => false,
        }
    }

    /// Remove a device row locally; its log records are untouched.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.devices.len();
        self.devices.retain(|d| d.id != id);
        self.devices.len() != before
    }
}
