//! Application services: the per-feature hooks over the mutation engine.
//!
//! Each service defines *what* key a user intent touches and *how* to
//! build its optimistic value, then delegates all consistency mechanics to
//! the coordinator. Services expose read-only derived views to the UI and
//! imperative actions the UI may await.

pub mod cart;
pub mod chat;
