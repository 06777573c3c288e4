//! Authentication endpoints used by the reverse proxy and the login page.

pub mod authenticate;
pub mod login;
pub mod redirect;
pub mod register;
pub mod session;
pub mod types;
