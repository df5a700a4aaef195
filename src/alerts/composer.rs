//! Builds the user-facing alert for a set of new listings.

use super::error::AlertError;
use crate::inventory::VehicleListing;
use crate::notifications::{AlertNotification, NotificationType, SavedSearchAlertData};
use crate::saved_search::{non_empty_list, non_empty_text, FilterFields, SavedSearch};

/// Marker prepended to every alert title.
pub const ALERT_MARKER: &str = "🔔";

/// Action tag stored in the payload for click-through tracking.
pub const ALERT_ACTION: &str = "saved_search_alert";

/// Number of listings spelled out in the body.
pub const MAX_LISTED_MATCHES: usize = 3;

pub const DEFAULT_SEARCH_PAGE_PATH: &str = "/recherche";

/// Formats a whole-euro amount the way fr-FR renders currency:
/// narrow no-break space between thousands groups, no-break space before the symbol.
pub fn format_price_eur(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 * 3 + 4);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('\u{202f}');
        }
        grouped.push(c);
    }
    let sign = if amount < 0 { "-" } else { "" };
    format!("{}{}\u{a0}€", sign, grouped)
}

/// Query string reproducing the filtered view on the search page.
///
/// Parameter order and names are fixed. Lists are comma-joined, boolean flags are
/// emitted only when true, blank fields are skipped.
pub fn filter_query(filters: &FilterFields) -> String {
    let mut params: Vec<(&'static str, String)> = Vec::new();

    let mut text = |name: &'static str, value: &Option<String>| {
        if let Some(v) = non_empty_text(value) {
            params.push((name, v.to_string()));
        }
    };
    text("brand", &filters.brand);
    text("model", &filters.model);

    if let Some(v) = filters.price_min {
        params.push(("priceMin", v.to_string()));
    }
    if let Some(v) = filters.price_max {
        params.push(("priceMax", v.to_string()));
    }
    if let Some(v) = filters.year_min {
        params.push(("yearMin", v.to_string()));
    }
    if let Some(v) = filters.year_max {
        params.push(("yearMax", v.to_string()));
    }
    if let Some(v) = filters.mileage_max {
        params.push(("mileageMax", v.to_string()));
    }

    let lists: [(&'static str, &Option<Vec<String>>); 3] = [
        ("bodyTypes", &filters.body_types),
        ("fuelTypes", &filters.fuel_types),
        ("transmissions", &filters.transmissions),
    ];
    for (name, value) in lists {
        if let Some(items) = non_empty_list(value) {
            params.push((name, items.join(",")));
        }
    }

    let texts: [(&'static str, &Option<String>); 2] = [
        ("bodyStyle", &filters.body_style),
        ("emissionStandard", &filters.emission_standard),
    ];
    for (name, value) in texts {
        if let Some(v) = non_empty_text(value) {
            params.push((name, v.to_string()));
        }
    }

    if filters.certified_history == Some(true) {
        params.push(("certifiedHistory", "true".to_string()));
    }

    let texts: [(&'static str, &Option<String>); 4] = [
        ("engineArchitecture", &filters.engine_architecture),
        ("intakeType", &filters.intake_type),
        ("exteriorColor", &filters.exterior_color),
        ("interiorColor", &filters.interior_color),
    ];
    for (name, value) in texts {
        if let Some(v) = non_empty_text(value) {
            params.push((name, v.to_string()));
        }
    }

    if let Some(v) = filters.seats {
        params.push(("seats", v.to_string()));
    }

    params
        .iter()
        .map(|(name, value)| format!("{}={}", name, urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Composes alert notifications. Pure and deterministic for a given input.
#[derive(Debug, Clone)]
pub struct AlertComposer {
    search_page_path: String,
}

impl Default for AlertComposer {
    fn default() -> Self {
        Self::new(DEFAULT_SEARCH_PAGE_PATH)
    }
}

impl AlertComposer {
    pub fn new(search_page_path: impl Into<String>) -> Self {
        Self {
            search_page_path: search_page_path.into(),
        }
    }

    pub fn title(&self, search: &SavedSearch) -> String {
        format!("{} Nouvelles annonces : {}", ALERT_MARKER, search.display_name())
    }

    pub fn body(&self, matches: &[VehicleListing]) -> String {
        let count = matches.len();
        let mut lines = Vec::with_capacity(MAX_LISTED_MATCHES + 2);
        lines.push(if count == 1 {
            "1 nouveau véhicule correspond à votre recherche.".to_string()
        } else {
            format!("{} nouveaux véhicules correspondent à votre recherche.", count)
        });

        for listing in matches.iter().take(MAX_LISTED_MATCHES) {
            lines.push(format!(
                "• {} {} - {}",
                listing.brand,
                listing.model,
                format_price_eur(listing.price)
            ));
        }

        let remaining = count.saturating_sub(MAX_LISTED_MATCHES);
        match remaining {
            0 => {}
            1 => lines.push("… et 1 autre annonce".to_string()),
            n => lines.push(format!("… et {} autres annonces", n)),
        }

        lines.join("\n")
    }

    pub fn link(&self, filters: &FilterFields) -> String {
        let query = filter_query(filters);
        if query.is_empty() {
            self.search_page_path.clone()
        } else {
            format!("{}?{}", self.search_page_path, query)
        }
    }

    /// Builds the single alert for `matches`, which must be non-empty.
    pub fn compose(
        &self,
        search: &SavedSearch,
        matches: &[VehicleListing],
    ) -> Result<AlertNotification, AlertError> {
        if matches.is_empty() {
            return Err(AlertError::Compose(format!(
                "no new matches for saved search {}",
                search.id
            )));
        }
        if search.owner_id.trim().is_empty() {
            return Err(AlertError::Compose(format!(
                "saved search {} has no owner",
                search.id
            )));
        }

        Ok(AlertNotification {
            recipient_id: search.owner_id.clone(),
            title: self.title(search),
            body: self.body(matches),
            category: NotificationType::SavedSearchAlert,
            link: self.link(&search.filters),
            payload: SavedSearchAlertData {
                action: ALERT_ACTION.to_string(),
                search_id: search.id.clone(),
                match_count: matches.len(),
                vehicle_ids: matches.iter().map(|l| l.id.clone()).collect(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn search(name: Option<&str>, filters: FilterFields) -> SavedSearch {
        SavedSearch {
            id: "search-42".to_string(),
            owner_id: "user-7".to_string(),
            name: name.map(str::to_string),
            is_active: true,
            filters,
            created_at: Utc::now() - Duration::days(1),
            last_notified_at: None,
        }
    }

    fn listings(n: usize) -> Vec<VehicleListing> {
        let now = Utc::now();
        (0..n)
            .map(|i| {
                VehicleListing::new(
                    format!("v-{}", i),
                    "Porsche",
                    format!("911 #{}", i),
                    100_000 + i as i64 * 1_000,
                    now - Duration::minutes(i as i64),
                )
            })
            .collect()
    }

    #[test]
    fn test_format_price_eur() {
        assert_eq!(format_price_eur(0), "0\u{a0}€");
        assert_eq!(format_price_eur(950), "950\u{a0}€");
        assert_eq!(format_price_eur(1_000), "1\u{202f}000\u{a0}€");
        assert_eq!(format_price_eur(120_000), "120\u{202f}000\u{a0}€");
        assert_eq!(format_price_eur(1_234_567), "1\u{202f}234\u{202f}567\u{a0}€");
        assert_eq!(format_price_eur(-2_500), "-2\u{202f}500\u{a0}€");
    }

    #[test]
    fn test_title_uses_display_name() {
        let composer = AlertComposer::default();
        assert_eq!(
            composer.title(&search(Some("Ma Porsche"), FilterFields::default())),
            "🔔 Nouvelles annonces : Ma Porsche"
        );
        assert_eq!(
            composer.title(&search(None, FilterFields::default())),
            "🔔 Nouvelles annonces : Ma recherche"
        );
    }

    #[test]
    fn test_body_singular() {
        let composer = AlertComposer::default();
        let mut one = listings(1);
        one[0].model = "911".to_string();
        one[0].price = 120_000;

        assert_eq!(
            composer.body(&one),
            "1 nouveau véhicule correspond à votre recherche.\n• Porsche 911 - 120\u{202f}000\u{a0}€"
        );
    }

    #[test]
    fn test_body_lists_three_and_summarizes_rest() {
        let composer = AlertComposer::default();
        let body = composer.body(&listings(5));
        let lines: Vec<&str> = body.lines().collect();

        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "5 nouveaux véhicules correspondent à votre recherche.");
        assert!(lines[1].starts_with("• Porsche 911 #0 - "));
        assert!(lines[2].starts_with("• Porsche 911 #1 - "));
        assert!(lines[3].starts_with("• Porsche 911 #2 - "));
        assert_eq!(lines[4], "… et 2 autres annonces");
    }

    #[test]
    fn test_body_with_exactly_four_uses_singular_remainder() {
        let composer = AlertComposer::default();
        let body = composer.body(&listings(4));
        assert!(body.ends_with("… et 1 autre annonce"));
    }

    #[test]
    fn test_body_with_three_has_no_remainder() {
        let composer = AlertComposer::default();
        let body = composer.body(&listings(3));
        assert_eq!(body.lines().count(), 4);
        assert!(!body.contains("autre"));
    }

    #[test]
    fn test_link_without_filters_is_bare_path() {
        let composer = AlertComposer::default();
        assert_eq!(composer.link(&FilterFields::default()), "/recherche");
    }

    #[test]
    fn test_link_serializes_every_field_in_order() {
        let filters = FilterFields {
            brand: Some("Porsche".to_string()),
            model: Some("911 Carrera".to_string()),
            price_min: Some(50_000),
            price_max: Some(150_000),
            year_min: Some(2015),
            year_max: Some(2022),
            mileage_max: Some(80_000),
            body_types: Some(vec!["coupe".to_string(), "cabriolet".to_string()]),
            fuel_types: Some(vec!["essence".to_string()]),
            transmissions: Some(vec!["automatique".to_string(), "manuelle".to_string()]),
            body_style: Some("sport".to_string()),
            emission_standard: Some("Euro 6".to_string()),
            certified_history: Some(true),
            engine_architecture: Some("flat-6".to_string()),
            intake_type: Some("turbo".to_string()),
            exterior_color: Some("gris".to_string()),
            interior_color: Some("noir".to_string()),
            seats: Some(4),
        };

        let composer = AlertComposer::new("/search");
        assert_eq!(
            composer.link(&filters),
            "/search?brand=Porsche&model=911%20Carrera&priceMin=50000&priceMax=150000\
             &yearMin=2015&yearMax=2022&mileageMax=80000&bodyTypes=coupe%2Ccabriolet\
             &fuelTypes=essence&transmissions=automatique%2Cmanuelle&bodyStyle=sport\
             &emissionStandard=Euro%206&certifiedHistory=true&engineArchitecture=flat-6\
             &intakeType=turbo&exteriorColor=gris&interiorColor=noir&seats=4"
        );
    }

    #[test]
    fn test_link_skips_false_flags_and_blank_values() {
        let filters = FilterFields {
            brand: Some(" ".to_string()),
            fuel_types: Some(vec!["".to_string()]),
            certified_history: Some(false),
            price_max: Some(150_000),
            ..Default::default()
        };
        assert_eq!(filter_query(&filters), "priceMax=150000");
    }

    #[test]
    fn test_compose_payload_contains_every_id() {
        let composer = AlertComposer::default();
        let search = search(Some("Porsche"), FilterFields::default());
        let matches = listings(5);

        let alert = composer.compose(&search, &matches).unwrap();

        assert_eq!(alert.recipient_id, "user-7");
        assert_eq!(alert.category, NotificationType::SavedSearchAlert);
        assert_eq!(alert.payload.action, ALERT_ACTION);
        assert_eq!(alert.payload.search_id, "search-42");
        assert_eq!(alert.payload.match_count, 5);
        assert_eq!(
            alert.payload.vehicle_ids,
            vec!["v-0", "v-1", "v-2", "v-3", "v-4"]
        );
    }

    #[test]
    fn test_compose_is_deterministic() {
        let composer = AlertComposer::default();
        let filters = FilterFields {
            brand: Some("Porsche".to_string()),
            price_max: Some(150_000),
            ..Default::default()
        };
        let search = search(Some("Porsche"), filters);
        let matches = listings(4);

        let first = composer.compose(&search, &matches).unwrap();
        let second = composer.compose(&search, &matches).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_compose_rejects_empty_matches() {
        let composer = AlertComposer::default();
        let result = composer.compose(&search(None, FilterFields::default()), &[]);
        assert!(matches!(result, Err(AlertError::Compose(_))));
    }

    #[test]
    fn test_compose_rejects_missing_owner() {
        let composer = AlertComposer::default();
        let mut search = search(None, FilterFields::default());
        search.owner_id = String::new();

        let result = composer.compose(&search, &listings(1));
        assert!(matches!(result, Err(AlertError::Compose(_))));
    }
}
