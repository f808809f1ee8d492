//! Domain models shared by the store, the gates and the API layer.

pub mod auth;
