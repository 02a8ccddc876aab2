//! API handlers module

pub mod admin;
pub mod ask;
pub mod health;
