mod claims;
mod jwt;

pub use claims::{AuthUser, Claims};
pub use jwt::JwtValidator;
