//! # carehub_core
//!
//! Core authentication and authorization logic for CareHub: credentials,
//! tokens, lockout, sessions, password resets, roles and facility scoping,
//! plus the persistence they share.

pub mod auth;
pub mod authz;
pub mod clock;
pub mod models;
pub mod store;
