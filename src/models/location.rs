use serde::{Deserialize, Serialize};

/// Pickup/dropoff branch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl Location {
    /// Format the address as a single line.
    pub fn formatted(&self) -> String {
        let mut parts = vec![self.name.clone()];
        if let Some(ref address) = self.address {
            if !address.is_empty() {
                parts.push(address.clone());
            }
        }
        if let Some(ref city) = self.city {
            if !city.is_empty() {
                parts.push(city.clone());
            }
        }
        parts.join(", ")
    }
}
