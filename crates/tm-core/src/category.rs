//! Item categories (kategori barang).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Categories created on first start when absent.
pub const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("Elektronik", "Ponsel, laptop, charger, earphone dan perangkat elektronik lain"),
    ("Dokumen", "KTM, KTP, SIM, buku tabungan dan dokumen penting"),
    ("Dompet & Tas", "Dompet, tas ransel, tas selempang, pouch"),
    ("Kunci", "Kunci kendaraan, kunci kos, gantungan kunci"),
    ("Pakaian", "Jaket, jas almamater, topi, sepatu"),
    ("Aksesoris", "Jam tangan, kacamata, perhiasan"),
    ("Alat Tulis", "Buku catatan, kalkulator, tempat pensil"),
    ("Botol & Wadah", "Botol minum, tumbler, kotak makan"),
    ("Lainnya", "Barang yang tidak termasuk kategori lain"),
];

/// An item category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: Uuid,
    /// Display name, unique ignoring case.
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A category together with the number of items filed under it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryWithCount {
    #[serde(flatten)]
    pub category: Category,
    pub item_count: u64,
}

/// Partial update for a category. `Some(None)` clears the description.
#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_categories_unique() {
        let mut names: Vec<String> = DEFAULT_CATEGORIES
            .iter()
            .map(|(n, _)| n.to_lowercase())
            .collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), DEFAULT_CATEGORIES.len());
    }

    #[test]
    fn test_count_flattened() {
        let with_count = CategoryWithCount {
            category: Category::new("Kunci", None),
            item_count: 3,
        };
        let json = serde_json::to_value(&with_count).unwrap();
        assert_eq!(json["name"], "Kunci");
        assert_eq!(json["item_count"], 3);
    }
}
