//! Found items (barang temuan) and their lifecycle.
//!
//! An item is logged by an officer (the pencatat) with status
//! [`ItemStatus::Unclaimed`]. It becomes [`ItemStatus::Returned`] exactly once,
//! when an officer (the penyerah) hands it to its owner, either directly or by
//! approving a claim. A returned item always carries `handed_over_by` and
//! `handed_over_at`; an unclaimed one never does.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Collection status of a found item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemStatus {
    /// Still stored at the lost-and-found desk.
    #[serde(rename = "BELUM_DIAMBIL")]
    Unclaimed,
    /// Handed back to its owner.
    #[serde(rename = "SUDAH_DIAMBIL")]
    Returned,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Unclaimed => "BELUM_DIAMBIL",
            ItemStatus::Returned => "SUDAH_DIAMBIL",
        }
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BELUM_DIAMBIL" | "UNCLAIMED" => Ok(ItemStatus::Unclaimed),
            "SUDAH_DIAMBIL" | "RETURNED" => Ok(ItemStatus::Returned),
            other => Err(format!("unknown item status: {}", other)),
        }
    }
}

/// A found item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoundItem {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub category_id: Uuid,
    pub found_location: String,
    pub found_at: DateTime<Utc>,
    /// Stored photo filename, served under `/uploads/`.
    pub photo: Option<String>,
    pub status: ItemStatus,
    /// Officer who logged the item.
    pub recorded_by: Uuid,
    /// Officer who handed the item back.
    pub handed_over_by: Option<Uuid>,
    /// Registered account of the owner, when known.
    pub claimant_id: Option<Uuid>,
    pub claimant_name: Option<String>,
    pub claimant_contact: Option<String>,
    pub handed_over_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FoundItem {
    /// Builds an unclaimed item recorded by `recorded_by`.
    pub fn new(input: NewItem, recorded_by: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: input.name,
            description: input.description,
            category_id: input.category_id,
            found_location: input.found_location,
            found_at: input.found_at,
            photo: input.photo,
            status: ItemStatus::Unclaimed,
            recorded_by,
            handed_over_by: None,
            claimant_id: None,
            claimant_name: None,
            claimant_contact: None,
            handed_over_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_returned(&self) -> bool {
        self.status == ItemStatus::Returned
    }

    /// Checks the status/handover invariant.
    pub fn is_consistent(&self) -> bool {
        match self.status {
            ItemStatus::Unclaimed => self.handed_over_by.is_none() && self.handed_over_at.is_none(),
            ItemStatus::Returned => self.handed_over_by.is_some() && self.handed_over_at.is_some(),
        }
    }
}

/// Input for recording a new item.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub name: String,
    pub description: Option<String>,
    pub category_id: Uuid,
    pub found_location: String,
    pub found_at: DateTime<Utc>,
    pub photo: Option<String>,
}

/// Partial update of an item's descriptive fields. Status and handover data
/// are only changed by a handover.
#[derive(Debug, Clone, Default)]
pub struct ItemUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub category_id: Option<Uuid>,
    pub found_location: Option<String>,
    pub found_at: Option<DateTime<Utc>>,
    pub photo: Option<Option<String>>,
}

impl ItemUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.category_id.is_none()
            && self.found_location.is_none()
            && self.found_at.is_none()
            && self.photo.is_none()
    }
}

/// Owner details recorded when an item is handed over.
#[derive(Debug, Clone)]
pub struct HandOver {
    pub claimant_id: Option<Uuid>,
    pub claimant_name: String,
    pub claimant_contact: Option<String>,
}

/// Filter for listing items.
#[derive(Debug, Clone, Default)]
pub struct ItemFilter {
    pub status: Option<ItemStatus>,
    pub category_id: Option<Uuid>,
    /// Matches name, description or location.
    pub search: Option<String>,
    pub found_from: Option<DateTime<Utc>>,
    pub found_until: Option<DateTime<Utc>>,
    pub recorded_by: Option<Uuid>,
}

/// An item joined with the names a detail view needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemDetail {
    #[serde(flatten)]
    pub item: FoundItem,
    pub category_name: String,
    pub recorded_by_name: String,
    pub handed_over_by_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample() -> FoundItem {
        FoundItem::new(
            NewItem {
                name: "Dompet coklat".to_string(),
                description: None,
                category_id: Uuid::new_v4(),
                found_location: "Perpustakaan lt. 2".to_string(),
                found_at: Utc::now() - Duration::hours(3),
                photo: None,
            },
            Uuid::new_v4(),
        )
    }

    #[test]
    fn test_new_item_is_unclaimed() {
        let item = sample();
        assert_eq!(item.status, ItemStatus::Unclaimed);
        assert!(!item.is_returned());
        assert!(item.is_consistent());
    }

    #[test]
    fn test_consistency_check() {
        let mut item = sample();
        item.status = ItemStatus::Returned;
        assert!(!item.is_consistent());

        item.handed_over_by = Some(Uuid::new_v4());
        item.handed_over_at = Some(Utc::now());
        assert!(item.is_consistent());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("BELUM_DIAMBIL".parse::<ItemStatus>(), Ok(ItemStatus::Unclaimed));
        assert_eq!("sudah_diambil".parse::<ItemStatus>(), Ok(ItemStatus::Returned));
        assert_eq!("returned".parse::<ItemStatus>(), Ok(ItemStatus::Returned));
        assert!("HILANG".parse::<ItemStatus>().is_err());
    }

    #[test]
    fn test_status_wire_format() {
        let json = serde_json::to_string(&ItemStatus::Returned).unwrap();
        assert_eq!(json, "\"SUDAH_DIAMBIL\"");
    }

    #[test]
    fn test_update_is_empty() {
        assert!(ItemUpdate::default().is_empty());
        let update = ItemUpdate {
            photo: Some(None),
            ..Default::default()
        };
        assert!(!update.is_empty());
    }
}
