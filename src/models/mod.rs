//! Data models for rental booking entities.
//!
//! This module contains the data structures exchanged with the booking API:
//!
//! - `UserProfile`, `Role`, `Credentials`: accounts and the session payload
//! - `Vehicle`, `VehicleSpec`: the rentable fleet and its spec sheets
//! - `Booking`: reservations with date ranges and lifecycle status
//! - `Payment`, `CheckoutSession`: charges and the external checkout handoff
//! - `Ticket`: customer support threads
//! - `Location`: pickup/dropoff branches
//!
//! The cache layer itself stores raw `serde_json::Value` payloads; these
//! types are the contract consumers deserialize snapshots into.

pub mod booking;
pub mod location;
pub mod payment;
pub mod ticket;
pub mod user;
pub mod vehicle;

pub use booking::{Booking, BookingStatus};
pub use location::Location;
pub use payment::{CheckoutSession, Payment, PaymentStatus};
pub use ticket::{Ticket, TicketStatus};
pub use user::{Credentials, LoginResponse, Role, UserProfile};
pub use vehicle::{Vehicle, VehicleSpec};
