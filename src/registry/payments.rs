//! Payment endpoints.
//!
//! `createPaymentSession` talks to the external checkout provider; its
//! response is an opaque redirect URL this layer only forwards. A settled
//! payment flips booking status server-side, so the status mutation
//! invalidates the booking wildcard too.

use reqwest::Method;

use super::{arg_i64, arg_id, clone_body, provides_list, update_body, Endpoint};
use crate::cache::tags::{Resource, Tag};

pub(super) fn endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint::query(
            "listPayments",
            Method::GET,
            |_| "/payments".to_string(),
            |_, result| provides_list(Resource::Payments, result),
        ),
        Endpoint::query(
            "getPaymentsByBookingId",
            Method::GET,
            |args| format!("/bookings/{}/payments", arg_i64(args, "bookingId")),
            |_, result| provides_list(Resource::Payments, result),
        ),
        Endpoint::mutation(
            "createPaymentSession",
            Method::POST,
            |_| "/payments/session".to_string(),
            clone_body,
            |_| vec![Tag::all(Resource::Payments)],
        ),
        Endpoint::mutation(
            "updatePaymentStatus",
            Method::PUT,
            |args| format!("/payments/{}", arg_id(args)),
            update_body,
            |args| {
                vec![
                    Tag::all(Resource::Payments),
                    Tag::item(Resource::Payments, arg_id(args)),
                    Tag::all(Resource::Bookings),
                ]
            },
        ),
    ]
}
