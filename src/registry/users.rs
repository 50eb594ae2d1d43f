//! User account endpoints (admin back-office roster plus profile editing).

use reqwest::Method;

use super::{arg_id, clone_body, no_body, provides_list, update_body, Endpoint};
use crate::cache::tags::{Resource, Tag};

pub(super) fn endpoints() -> Vec<Endpoint> {
    vec![
        Endpoint::query(
            "listUsers",
            Method::GET,
            |_| "/users".to_string(),
            |_, result| provides_list(Resource::Users, result),
        ),
        Endpoint::query(
            "getUserById",
            Method::GET,
            |args| format!("/users/{}", arg_id(args)),
            |args, _| vec![Tag::item(Resource::Users, arg_id(args))],
        ),
        Endpoint::mutation(
            "createUser",
            Method::POST,
            |_| "/users".to_string(),
            clone_body,
            |_| vec![Tag::all(Resource::Users)],
        ),
        Endpoint::mutation(
            "updateUser",
            Method::PUT,
            |args| format!("/users/{}", arg_id(args)),
            update_body,
            |args| {
                vec![
                    Tag::all(Resource::Users),
                    Tag::item(Resource::Users, arg_id(args)),
                ]
            },
        ),
        Endpoint::mutation(
            "deleteUser",
            Method::DELETE,
            |args| format!("/users/{}", arg_id(args)),
            no_body,
            |args| {
                vec![
                    Tag::all(Resource::Users),
                    Tag::item(Resource::Users, arg_id(args)),
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
    fn test_get_user_by_id_shapes() {
        let registry = Registry::standard().unwrap();
        let endpoint = registry.get("getUserById").unwrap();
        let args = serde_json::json!({"id": 12});
        assert_eq!(endpoint.path(&args), "/users/12");
        assert_eq!(endpoint.cache_key(&args), "getUserById({\"id\":12})");
        assert_eq!(
            endpoint.provides(&args, &serde_json::json!({})),
            vec![Tag::item(Resource::Users, 12)]
        );
    }

    #[test]
    fn test_update_user_invalidates_wildcard_and_instance() {
        let registry = Registry::standard().unwrap();
        let endpoint = registry.get("updateUser").unwrap();
        let args = serde_json::json!({"id": 12, "body": {"firstName": "Ada"}});
        let tags = endpoint.invalidates(&args);
        assert!(tags.contains(&Tag::all(Resource::Users)));
        assert!(tags.contains(&Tag::item(Resource::Users, 12)));
        assert_eq!(
            endpoint.body_value(&args),
            Some(serde_json::json!({"firstName": "Ada"}))
        );
    }
}
