//! Role name constants shared by the API layer and tests.

/// Full administrative access: sees all jobs, can issue credit grants.
pub const ROLE_ADMIN: &str = "admin";

/// Default role: owns and manages only their own generations.
pub const ROLE_CREATOR: &str = "creator";
