use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A vehicle listing as exposed by the marketplace inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleListing {
    pub id: String,
    pub brand: String,
    pub model: String,
    /// Asking price in whole euros.
    pub price: i64,
    pub year: Option<i32>,
    /// Odometer reading in kilometres.
    pub mileage: Option<i64>,
    pub body_type: Option<String>,
    pub fuel_type: Option<String>,
    pub transmission: Option<String>,
    pub body_style: Option<String>,
    pub emission_standard: Option<String>,
    pub certified_history: bool,
    pub engine_architecture: Option<String>,
    pub intake_type: Option<String>,
    pub exterior_color: Option<String>,
    pub interior_color: Option<String>,
    pub seats: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl VehicleListing {
    /// Minimal listing with every optional dimension unset.
    pub fn new(
        id: impl Into<String>,
        brand: impl Into<String>,
        model: impl Into<String>,
        price: i64,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            brand: brand.into(),
            model: model.into(),
            price,
            year: None,
            mileage: None,
            body_type: None,
            fuel_type: None,
            transmission: None,
            body_style: None,
            emission_standard: None,
            certified_history: false,
            engine_architecture: None,
            intake_type: None,
            exterior_color: None,
            interior_color: None,
            seats: None,
            created_at,
        }
    }
}
