//! Fayda eSignet OAuth library
//!
//! Provides PKCE session generation, authorization URL construction, the
//! authorization-code-for-token exchange, private-key-JWT client assertions
//! and unverified decoding of identity claims carried in returned tokens.
//! The crate has no dependency on the gateway binary and can be used from any
//! client that needs to drive the eSignet flow.
//!
//! Verification flow:
//! 1. Client calls `pkce::PkceSession::generate()` and stores the verifier
//! 2. User authorizes via `pkce::build_authorization_url()`
//! 3. Gateway calls `token::EsignetClient::exchange_code()` with the code and verifier
//! 4. Identity attributes read from the ID token via `claims::decode_unverified()`
//!
//! Token signatures are NOT verified. Claims returned by `decode_unverified`
//! must be treated as untrusted input.

pub mod assertion;
pub mod claims;
pub mod constants;
pub mod error;
pub mod pkce;
pub mod token;

pub use assertion::ClientAssertionSigner;
pub use claims::{Address, IdentityClaims, decode_unverified};
pub use constants::*;
pub use error::{Error, Result};
pub use pkce::{
    AuthorizationParams, PkceSession, build_authorization_url, generate_code_challenge,
    generate_code_verifier, generate_state,
};
pub use token::{EsignetClient, ExchangeRequest, TokenExchanger, TokenResponse};
