//! Session tokens and password credentials.

pub mod password;
pub mod token;
