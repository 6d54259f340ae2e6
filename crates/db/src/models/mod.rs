//! Row structs and DTOs.

pub mod user;
