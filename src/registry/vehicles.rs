//! Vehicle and vehicle-specification endpoints.
//!
//! Specs are their own resource family: spec rows are edited independently
//! of the vehicle they describe, so they invalidate separately.

use reqwest::Method;

use super::{arg_i64, arg_id, clone_body, no_body, provides_list, update_body, Endpoint};
use crate::cache::tags::{Resource, Tag};

pub(super) fn endpoints() -> Vec<Endpoint> {
    vec![
        // ===== Vehicles =====
        Endpoint::query(
            "listVehicles",
            Method::GET,
            |_| "/vehicles".to_string(),
            |_, result| provides_list(Resource::Vehicles, result),
        ),
        Endpoint::query(
            "getVehicleById",
            Method::GET,
            |args| format!("/vehicles/{}", arg_id(args)),
            |args, _| vec![Tag::item(Resource::Vehicles, arg_id(args))],
        ),
        Endpoint::mutation(
            "createVehicle",
            Method::POST,
            |_| "/vehicles".to_string(),
            clone_body,
            |_| vec![Tag::all(Resource::Vehicles)],
        ),
        Endpoint::mutation(
            "updateVehicle",
            Method::PUT,
            |args| format!("/vehicles/{}", arg_id(args)),
            update_body,
            |args| {
                vec![
                    Tag::all(Resource::Vehicles),
                    Tag::item(Resource::Vehicles, arg_id(args)),
                ]
            },
        ),
        Endpoint::mutation(
            "deleteVehicle",
            Method::DELETE,
            |args| format!("/vehicles/{}", arg_id(args)),
            no_body,
            |args| {
                vec![
                    Tag::all(Resource::Vehicles),
                    Tag::item(Resource::Vehicles, arg_id(args)),
                ]
            },
        ),
        // ===== Vehicle specs =====
        Endpoint::query(
            "listVehicleSpecs",
            Method::GET,
            |_| "/vehicle-specs".to_string(),
            |_, result| provides_list(Resource::VehicleSpecs, result),
        ),
        Endpoint::query(
            "getSpecsByVehicleId",
            Method::GET,
            |args| format!("/vehicles/{}/specs", arg_i64(args, "vehicleId")),
            |_, result| provides_list(Resource::VehicleSpecs, result),
        ),
        Endpoint::mutation(
            "createVehicleSpec",
            Method::POST,
            |_| "/vehicle-specs".to_string(),
            clone_body,
            |_| vec![Tag::all(Resource::VehicleSpecs)],
        ),
        Endpoint::mutation(
            "updateVehicleSpec",
            Method::PUT,
            |args| format!("/vehicle-specs/{}", arg_id(args)),
            update_body,
            |args| {
                vec![
                    Tag::all(Resource::VehicleSpecs),
                    Tag::item(Resource::VehicleSpecs, arg_id(args)),
                ]
            },
        ),
        Endpoint::mutation(
            "deleteVehicleSpec",
            Method::DELETE,
            |args| format!("/vehicle-specs/{}", arg_id(args)),
            no_body,
            |args| {
                vec![
                    Tag::all(Resource::VehicleSpecs),
                    Tag::item(Resource::VehicleSpecs, arg_id(args)),
                ]
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    #[test]
    fn test_specs_by_vehicle_path_uses_parent_id() {
        let registry = Registry::standard().unwrap();
        let endpoint = registry.get("getSpecsByVehicleId").unwrap();
        let args = serde_json::json!({"vehicleId": 7});
        assert_eq!(endpoint.path(&args), "/vehicles/7/specs");
        assert_eq!(
            endpoint.cache_key(&args),
            "getSpecsByVehicleId({\"vehicleId\":7})"
        );
    }

    #[test]
    fn test_spec_rows_get_instance_tags_from_result() {
        let registry = Registry::standard().unwrap();
        let endpoint = registry.get("getSpecsByVehicleId").unwrap();
        let result = serde_json::json!([{"id": 31, "vehicleId": 7}]);
        let tags = endpoint.provides(&serde_json::json!({"vehicleId": 7}), &result);
        assert!(tags.contains(&Tag::all(Resource::VehicleSpecs)));
        assert!(tags.contains(&Tag::item(Resource::VehicleSpecs, 31)));
    }

    #[test]
    fn test_vehicle_and_spec_families_invalidate_independently() {
        let registry = Registry::standard().unwrap();
        let tags = registry
            .get("updateVehicleSpec")
            .unwrap()
            .invalidates(&serde_json::json!({"id": 31}));
        assert!(!tags.contains(&Tag::all(Resource::Vehicles)));
    }
}
