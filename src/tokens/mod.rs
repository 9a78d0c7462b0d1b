//! Persistent pseudonym tokens for `(field, value)` pairs.
//!
//! Tokens are random and stable: the first call for a pair assigns one, every
//! later call returns the same token. The store offers no cryptographic
//! protection, anyone who can read the file can reverse every token. Pairs are
//! keyed as `field:value`, so pairs whose `:` positions line up (`("a:b", "c")`
//! and `("a", "b:c")`) share a token.

mod error;
mod store;

pub use error::TokenStoreError;
pub use store::TokenStore;
