//! Support ticket endpoints.

use reqwest::Method;

use super::{arg_i64, arg_id, clone_body, no_body, provides_list, update_body, Endpoint};
use crate::cache::tags::{Resource, Tag};

pub(super) fn endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint::query(
            "listTickets",
            Method::GET,
            |_| "/tickets".to_string(),
            |_, result| provides_list(Resource::Tickets, result),
        ),
        Endpoint::query(
            "getTicketById",
            Method::GET,
            |args| format!("/tickets/{}", arg_id(args)),
            |args, _| vec![Tag::item(Resource::Tickets, arg_id(args))],
        ),
        Endpoint::query(
            "getTicketsByUserId",
            Method::GET,
            |args| format!("/users/{}/tickets", arg_i64(args, "userId")),
            |_, result| provides_list(Resource::Tickets, result),
        ),
        Endpoint::mutation(
            "createTicket",
            Method::POST,
            |_| "/tickets".to_string(),
            clone_body,
            |_| vec![Tag::all(Resource::Tickets)],
        ),
        // Admin reply or close, from the back office
        Endpoint::mutation(
            "updateTicket",
            Method::PUT,
            |args| format!("/tickets/{}", arg_id(args)),
            update_body,
            |args| {
                vec![
                    Tag::all(Resource::Tickets),
                    Tag::item(Resource::Tickets, arg_id(args)),
                ]
            },
        ),
        Endpoint::mutation(
            "deleteTicket",
            Method::DELETE,
            |args| format!("/tickets/{}", arg_id(args)),
            no_body,
            |args| {
                vec![
                    Tag::all(Resource::Tickets),
                    Tag::item(Resource::Tickets, arg_id(args)),
                ]
            },
        ),
    ]
}
