use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: i64,
    pub name: String,
    pub brand: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub year: Option<i32>,
    pub price_per_day: f64,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub location_id: Option<i64>,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

impl Vehicle {
    pub fn display_name(&self) -> String {
        match self.model {
            Some(ref model) => format!("{} {} {}", self.brand, model, self.name),
            None => format!("{} {}", self.brand, self.name),
        }
        .trim()
        .to_string()
    }

    pub fn price_display(&self) -> String {
        format!("${:.2}/day", self.price_per_day)
    }
}

/// Technical specification sheet attached to a vehicle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSpec {
    pub id: i64,
    pub vehicle_id: i64,
    #[serde(default)]
    pub transmission: Option<String>,
    #[serde(default)]
    pub fuel_type: Option<String>,
    #[serde(default)]
    pub seats: Option<i32>,
    #[serde(default)]
    pub mileage: Option<i32>,
    #[serde(default)]
    pub color: Option<String>,
}

impl VehicleSpec {
    /// Single-line summary for listing rows.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(ref transmission) = self.transmission {
            parts.push(transmission.clone());
        }
        if let Some(ref fuel) = self.fuel_type {
            parts.push(fuel.clone());
        }
        if let Some(seats) = self.seats {
            parts.push(format!("{} seats", seats));
        }
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_with_and_without_model() {
        let json = serde_json::json!({
            "id": 7, "name": "GT", "brand": "Ford", "model": "Mustang",
            "pricePerDay": 129.0
        });
        let vehicle: Vehicle = serde_json::from_value(json).unwrap();
        assert_eq!(vehicle.display_name(), "Ford Mustang GT");
        assert!(vehicle.available);

        let bare = Vehicle {
            model: None,
            ..vehicle
        };
        assert_eq!(bare.display_name(), "Ford GT");
    }

    #[test]
    fn test_spec_summary_skips_missing_fields() {
        let spec = VehicleSpec {
            id: 1,
            vehicle_id: 7,
            transmission: Some("Automatic".into()),
            fuel_type: None,
            seats: Some(5),
            mileage: None,
            color: None,
        };
        assert_eq!(spec.summary(), "Automatic, 5 seats");
    }
}
