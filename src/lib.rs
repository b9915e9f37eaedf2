pub mod config;
pub mod error;
pub mod secret;
pub mod store;
pub mod token;

pub use config::Config;
pub use error::TokenError;
pub use store::{MemoryTokenRows, PgTokenRows, TokenMapper, TokenRows};
pub use token::{AuthToken, NewToken, RecoveryMaterial, RememberFlag, TokenInfo, TokenType};
