//! Pickup/dropoff location endpoints.

use reqwest::Method;

use super::{arg_id, clone_body, no_body, provides_list, update_body, Endpoint};
use crate::cache::tags::{Resource, Tag};

pub(super) fn endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint::query(
            "listLocations",
            Method::GET,
            |_| "/locations".to_string(),
            |_, result| provides_list(Resource::Locations, result),
        ),
        Endpoint::query(
            "getLocationById",
            Method::GET,
            |args| format!("/locations/{}", arg_id(args)),
            |args, _| vec![Tag::item(Resource::Locations, arg_id(args))],
        ),
        Endpoint::mutation(
            "createLocation",
            Method::POST,
            |_| "/locations".to_string(),
            clone_body,
            |_| vec![Tag::all(Resource::Locations)],
        ),
        Endpoint::mutation(
            "updateLocation",
            Method::PUT,
            |args| format!("/locations/{}", arg_id(args)),
            update_body,
            |args| {
                vec![
                    Tag::all(Resource::Locations),
                    Tag::item(Resource::Locations, arg_id(args)),
                ]
            },
        ),
        Endpoint::mutation(
            "deleteLocation",
            Method::DELETE,
            |args| format!("/locations/{}", arg_id(args)),
            no_body,
            |args| {
                vec![
                    Tag::all(Resource::Locations),
                    Tag::item(Resource::Locations, arg_id(args)),
                ]
            },
        ),
    ]
}
