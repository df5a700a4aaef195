//! Saved search data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::inventory::VehicleListing;

/// Label used when a saved search has no usable name.
pub const DEFAULT_SEARCH_NAME: &str = "Ma recherche";

/// Constraints of a saved search.
///
/// Every field is optional and an absent (or empty) field means "no constraint on this
/// dimension". Present fields are combined with AND. The serialized names double as the
/// query parameter names of the search page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FilterFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_min: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_max: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_min: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year_max: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mileage_max: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fuel_types: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transmissions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_style: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emission_standard: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certified_history: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_architecture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intake_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exterior_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interior_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seats: Option<i32>,
}

/// Returns the trimmed text if it is non-empty.
pub fn non_empty_text(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Returns the list if it has at least one non-blank entry.
pub fn non_empty_list(value: &Option<Vec<String>>) -> Option<Vec<&str>> {
    let items: Vec<&str> = value
        .as_ref()?
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

fn text_matches(constraint: &Option<String>, actual: Option<&str>) -> bool {
    match non_empty_text(constraint) {
        None => true,
        Some(wanted) => actual.is_some_and(|value| value.trim().eq_ignore_ascii_case(wanted)),
    }
}

fn list_matches(constraint: &Option<Vec<String>>, actual: Option<&str>) -> bool {
    match non_empty_list(constraint) {
        None => true,
        Some(accepted) => actual.is_some_and(|value| {
            accepted
                .iter()
                .any(|candidate| value.trim().eq_ignore_ascii_case(candidate))
        }),
    }
}

fn at_least<T: PartialOrd>(bound: Option<T>, actual: Option<T>) -> bool {
    match bound {
        None => true,
        Some(min) => actual.is_some_and(|value| value >= min),
    }
}

fn at_most<T: PartialOrd>(bound: Option<T>, actual: Option<T>) -> bool {
    match bound {
        None => true,
        Some(max) => actual.is_some_and(|value| value <= max),
    }
}

impl FilterFields {
    /// True when no dimension is constrained.
    pub fn is_unconstrained(&self) -> bool {
        non_empty_text(&self.brand).is_none()
            && non_empty_text(&self.model).is_none()
            && self.price_min.is_none()
            && self.price_max.is_none()
            && self.year_min.is_none()
            && self.year_max.is_none()
            && self.mileage_max.is_none()
            && non_empty_list(&self.body_types).is_none()
            && non_empty_list(&self.fuel_types).is_none()
            && non_empty_list(&self.transmissions).is_none()
            && non_empty_text(&self.body_style).is_none()
            && non_empty_text(&self.emission_standard).is_none()
            && self.certified_history != Some(true)
            && non_empty_text(&self.engine_architecture).is_none()
            && non_empty_text(&self.intake_type).is_none()
            && non_empty_text(&self.exterior_color).is_none()
            && non_empty_text(&self.interior_color).is_none()
            && self.seats.is_none()
    }

    /// Evaluates the matcher contract against a single listing.
    ///
    /// Text comparisons ignore ASCII case, ranges are inclusive, and a listing that lacks
    /// a constrained dimension does not match.
    pub fn matches(&self, listing: &VehicleListing) -> bool {
        text_matches(&self.brand, Some(listing.brand.as_str()))
            && text_matches(&self.model, Some(listing.model.as_str()))
            && at_least(self.price_min, Some(listing.price))
            && at_most(self.price_max, Some(listing.price))
            && at_least(self.year_min, listing.year)
            && at_most(self.year_max, listing.year)
            && at_most(self.mileage_max, listing.mileage)
            && list_matches(&self.body_types, listing.body_type.as_deref())
            && list_matches(&self.fuel_types, listing.fuel_type.as_deref())
            && list_matches(&self.transmissions, listing.transmission.as_deref())
            && text_matches(&self.body_style, listing.body_style.as_deref())
            && text_matches(&self.emission_standard, listing.emission_standard.as_deref())
            && (self.certified_history != Some(true) || listing.certified_history)
            && text_matches(&self.engine_architecture, listing.engine_architecture.as_deref())
            && text_matches(&self.intake_type, listing.intake_type.as_deref())
            && text_matches(&self.exterior_color, listing.exterior_color.as_deref())
            && text_matches(&self.interior_color, listing.interior_color.as_deref())
            && self.seats.map_or(true, |wanted| listing.seats == Some(wanted))
    }
}

/// A user's saved search together with its notification watermark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedSearch {
    pub id: String,
    pub owner_id: String,
    pub name: Option<String>,
    pub is_active: bool,
    pub filters: FilterFields,
    pub created_at: DateTime<Utc>,
    /// High-water mark of the last delivered alert. Only ever moves forward.
    pub last_notified_at: Option<DateTime<Utc>>,
}

impl SavedSearch {
    /// Name shown to the user, falling back to a generic label.
    pub fn display_name(&self) -> &str {
        non_empty_text(&self.name).unwrap_or(DEFAULT_SEARCH_NAME)
    }

    /// Listings created strictly after this instant are considered new.
    pub fn freshness_floor(&self) -> DateTime<Utc> {
        self.last_notified_at.unwrap_or(self.created_at)
    }
}

/// Input for creating a saved search.
#[derive(Debug, Clone, Default)]
pub struct NewSavedSearch {
    pub owner_id: String,
    pub name: Option<String>,
    pub filters: FilterFields,
}
