//! Booking endpoints.
//!
//! Booking writes also invalidate the vehicle wildcard: a reservation
//! changes which vehicles show as available, and every open fleet view must
//! pick that up without a manual refresh.

use reqwest::Method;

use super::{arg_i64, arg_id, clone_body, no_body, provides_list, update_body, Endpoint};
use crate::cache::tags::{Resource, Tag};

pub(super) fn endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint::query(
            "listBookings",
            Method::GET,
            |_| "/bookings".to_string(),
            |_, result| provides_list(Resource::Bookings, result),
        ),
        Endpoint::query(
            "getBookingById",
            Method::GET,
            |args| format!("/bookings/{}", arg_id(args)),
            |args, _| vec![Tag::item(Resource::Bookings, arg_id(args))],
        ),
        Endpoint::query(
            "getBookingsByUserId",
            Method::GET,
            |args| format!("/users/{}/bookings", arg_i64(args, "userId")),
            |_, result| provides_list(Resource::Bookings, result),
        ),
        Endpoint::mutation(
            "createBooking",
            Method::POST,
            |_| "/bookings".to_string(),
            clone_body,
            |_| vec![Tag::all(Resource::Bookings), Tag::all(Resource::Vehicles)],
        ),
        Endpoint::mutation(
            "updateBooking",
            Method::PUT,
            |args| format!("/bookings/{}", arg_id(args)),
            update_body,
            |args| {
                vec![
                    Tag::all(Resource::Bookings),
                    Tag::item(Resource::Bookings, arg_id(args)),
                ]
            },
        ),
        Endpoint::mutation(
            "deleteBooking",
            Method::DELETE,
            |args| format!("/bookings/{}", arg_id(args)),
            no_body,
            |args| {
                vec![
                    Tag::all(Resource::Bookings),
                    Tag::item(Resource::Bookings, arg_id(args)),
                    Tag::all(Resource::Vehicles),
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
    fn test_bookings_by_user_key_is_scoped_to_user() {
        let registry = Registry::standard().unwrap();
        let endpoint = registry.get("getBookingsByUserId").unwrap();
        let a = endpoint.cache_key(&serde_json::json!({"userId": 2}));
        let b = endpoint.cache_key(&serde_json::json!({"userId": 3}));
        assert_ne!(a, b);
        assert_eq!(endpoint.path(&serde_json::json!({"userId": 2})), "/users/2/bookings");
    }

    #[test]
    fn test_create_booking_also_invalidates_vehicles() {
        let registry = Registry::standard().unwrap();
        let tags = registry
            .get("createBooking")
            .unwrap()
            .invalidates(&serde_json::json!({"vehicleId": 7}));
        assert!(tags.contains(&Tag::all(Resource::Bookings)));
        assert!(tags.contains(&Tag::all(Resource::Vehicles)));
    }
}
