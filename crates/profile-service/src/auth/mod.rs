//! Bearer-token authentication core.
//!
//! # Components
//!
//! - `keys` - key set cache over the identity service's JWKS endpoint
//! - `revocation` - token blacklist behind a narrow store trait
//! - `validator` - the validation pipeline composing the two
//! - `claims` - typed claims decoded from validated tokens

pub mod claims;
pub mod keys;
pub mod revocation;
pub mod validator;

pub use claims::TokenClaims;
pub use keys::{KeySetCache, SigningKey};
pub use revocation::{MemoryRevocationStore, RedisRevocationStore, RevocationStore};
pub use validator::{token_id, TokenValidator, MAX_TOKEN_SIZE_BYTES};
