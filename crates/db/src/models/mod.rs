//! Domain model structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` entity struct matching the database row
//! - A `Deserialize` create DTO for inserts
//! - Query-parameter structs for list endpoints

pub mod credit;
pub mod event;
pub mod generation_job;
pub mod status;
pub mod user;
