mod credentials;
mod token;
mod user;

pub use credentials::{hash_password, LoginCredentials, Registration, MIN_PASSWORD_LENGTH};
pub use token::{AuthToken, AUTH_TOKEN_COOKIE};
pub use user::{Admin, Rights, Role, Voter};
