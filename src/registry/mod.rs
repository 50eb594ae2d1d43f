//! Endpoint registry: the declarative description of every read and write
//! operation against the booking API.
//!
//! Each endpoint is a closed tagged variant - a query carries a `provides`
//! tag builder, a mutation an `invalidates` tag builder - with its cache-key
//! shape and HTTP method/path template. Registration happens once at client
//! construction and is checked then: duplicate names are rejected rather
//! than discovered at call time.
//!
//! Declaration rule carried by every family: list queries always provide
//! the type-wildcard tag, so a create anywhere in the family invalidates
//! every open list view even though the new row's id was unknown at query
//! time.

mod bookings;
mod locations;
mod payments;
mod tickets;
mod users;
mod vehicles;

use std::collections::HashMap;

use reqwest::Method;
use serde_json::Value;
use thiserror::Error;

use crate::cache::tags::{Resource, Tag};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Query,
    Mutation,
}

type PathBuilder = fn(&Value) -> String;
type KeyBuilder = fn(&Value) -> String;
type BodyBuilder = fn(&Value) -> Option<Value>;
/// Sees both the arguments and the fetched result, so list queries can tag
/// the individual rows they happened to contain.
type ProvidesBuilder = fn(&Value, &Value) -> Vec<Tag>;
type InvalidatesBuilder = fn(&Value) -> Vec<Tag>;

pub struct Endpoint {
    pub name: &'static str,
    pub kind: EndpointKind,
    pub method: Method,
    path: PathBuilder,
    key: Option<KeyBuilder>,
    body: BodyBuilder,
    provides: Option<ProvidesBuilder>,
    invalidates: Option<InvalidatesBuilder>,
}

impl Endpoint {
    pub fn query(
        name: &'static str,
        method: Method,
        path: PathBuilder,
        provides: ProvidesBuilder,
    ) -> Self {
        Self {
            name,
            kind: EndpointKind::Query,
            method,
            path,
            key: None,
            body: |_| None,
            provides: Some(provides),
            invalidates: None,
        }
    }

    pub fn mutation(
        name: &'static str,
        method: Method,
        path: PathBuilder,
        body: BodyBuilder,
        invalidates: InvalidatesBuilder,
    ) -> Self {
        Self {
            name,
            kind: EndpointKind::Mutation,
            method,
            path,
            key: None,
            body,
            provides: None,
            invalidates: Some(invalidates),
        }
    }

    /// Serialized (endpoint, arguments) identity of a cacheable result.
    /// Argument objects serialize in insertion order, so callers building
    /// the same argument shape get the same key.
    pub fn cache_key(&self, args: &Value) -> String {
        match self.key {
            Some(build) => build(args),
            None => default_key(self.name, args),
        }
    }

    pub fn path(&self, args: &Value) -> String {
        (self.path)(args)
    }

    pub fn body_value(&self, args: &Value) -> Option<Value> {
        (self.body)(args)
    }

    pub fn provides(&self, args: &Value, result: &Value) -> Vec<Tag> {
        match self.provides {
            Some(build) => build(args, result),
            None => Vec::new(),
        }
    }

    pub fn invalidates(&self, args: &Value) -> Vec<Tag> {
        match self.invalidates {
            Some(build) => build(args),
            None => Vec::new(),
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self.kind {
            EndpointKind::Query => "query",
            EndpointKind::Mutation => "mutation",
        }
    }
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Endpoint `{0}` is already registered")]
    DuplicateEndpoint(&'static str),
}

pub struct Registry {
    endpoints: HashMap<&'static str, Endpoint>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            endpoints: HashMap::new(),
        }
    }

    /// The built-in endpoint set: all seven resource families.
    pub fn standard() -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        let families = [
            users::endpoints(),
            vehicles::endpoints(),
            bookings::endpoints(),
            payments::endpoints(),
            tickets::endpoints(),
            locations::endpoints(),
        ];
        for endpoint in families.into_iter().flatten() {
            registry.define(endpoint)?;
        }
        Ok(registry)
    }

    pub fn define(&mut self, endpoint: Endpoint) -> Result<(), RegistryError> {
        if self.endpoints.contains_key(endpoint.name) {
            return Err(RegistryError::DuplicateEndpoint(endpoint.name));
        }
        self.endpoints.insert(endpoint.name, endpoint);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints.get(name)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

// ===== Shared builder helpers =====

pub(crate) fn default_key(name: &str, args: &Value) -> String {
    if args.is_null() {
        format!("{}()", name)
    } else {
        format!("{}({})", name, args)
    }
}

pub(crate) fn arg_id(args: &Value) -> i64 {
    args.get("id").and_then(Value::as_i64).unwrap_or(0)
}

pub(crate) fn arg_i64(args: &Value, field: &str) -> i64 {
    args.get(field).and_then(Value::as_i64).unwrap_or(0)
}

/// Standard provide set for a list query: the type wildcard plus an instance
/// tag per returned row.
pub(crate) fn provides_list(resource: Resource, result: &Value) -> Vec<Tag> {
    let mut tags = vec![Tag::all(resource)];
    if let Some(rows) = result.as_array() {
        tags.extend(
            rows.iter()
                .filter_map(|row| row.get("id").and_then(Value::as_i64))
                .map(|id| Tag::item(resource, id)),
        );
    }
    tags
}

pub(crate) fn clone_body(args: &Value) -> Option<Value> {
    Some(args.clone())
}

pub(crate) fn update_body(args: &Value) -> Option<Value> {
    args.get("body").cloned()
}

pub(crate) fn no_body(_args: &Value) -> Option<Value> {
    None
}
