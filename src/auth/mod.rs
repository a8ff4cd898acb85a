pub mod auth;
pub mod permissions;
pub mod token;
pub mod user;

pub use auth::*;
pub use permissions::*;
pub use token::*;
pub use user::*;
