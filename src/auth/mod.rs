//! Authentication: credential resolution, token persistence, and the
//! session manager that keeps a valid bearer token for all API calls.

pub mod credentials;
pub mod session;
pub mod token;

pub use credentials::{CredentialOverrides, Credentials};
pub use session::{Session, SessionBuilder};
pub use token::{Token, TokenStore};
