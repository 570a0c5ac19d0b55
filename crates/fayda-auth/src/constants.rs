//! Fayda eSignet defaults
//!
//! Public endpoints and parameters of the national ID provider. None of
//! these are secrets; the client signing key and API keys are handled
//! elsewhere.

/// eSignet authorization endpoint
pub const AUTHORIZE_ENDPOINT: &str = "https://esignet.ida.fayda.et/authorize";

/// eSignet token endpoint for the authorization code exchange
pub const TOKEN_ENDPOINT: &str = "https://esignet.ida.fayda.et/v1/esignet/oauth/v2/token";

/// OpenID scopes requested for KYC
pub const SCOPES: &str = "openid profile email phone address";

/// Authentication context classes accepted for a verification
pub const ACR_VALUES: &str =
    "mosip:idp:acr:generated-code mosip:idp:acr:biometrics mosip:idp:acr:static-code";

/// UI locale passed to the eSignet login page
pub const UI_LOCALES: &str = "en";

/// `client_assertion_type` for private-key-JWT client authentication (RFC 7523)
pub const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Lifetime of a signed client assertion, in seconds
pub const CLIENT_ASSERTION_TTL_SECS: u64 = 300;
