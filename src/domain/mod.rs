//! Domain layer types and invariants.

pub mod cart;
pub mod chat;
