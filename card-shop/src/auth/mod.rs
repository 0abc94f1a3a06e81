//! Session lookup and the admin gate
//!
//! Sessions are created by the login flow; here they are only resolved from
//! the `shop_session` cookie.

pub mod admin;
pub mod session;

pub use admin::{AdminIdentity, admin_middleware};
pub use session::{CurrentSession, MaybeSession, SESSION_COOKIE, cookie_value};
