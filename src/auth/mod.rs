mod helpers;
mod middleware;
mod password;
pub mod scope;
mod token;

pub use helpers::extract_bearer_token;
pub use middleware::{AuthError, OptionalAuth, RequireAdmin, RequireAuth};
pub use password::Argon2Hasher;
pub use scope::{resolve_scope, resolve_write_scope};
pub use token::{TOKEN_TYPE, TokenIssuer};
