//! Records returned by the stores.
//!
//! Field names serialize as the underlying column names (`pet_id`, `user_email`,
//! ...) because the existing client reads them that way.

pub mod pet;
pub mod user;
