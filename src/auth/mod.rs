//! Bearer-token authentication. Tokens are issued by the account service;
//! this crate only verifies them.

pub mod jwt;

pub use jwt::AuthUser;
