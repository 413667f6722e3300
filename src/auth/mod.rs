//! Authentication against the external identity provider: token types, the
//! OAuth authorization-code flow, credential assembly and profile resolution.

pub mod credentials;
pub mod flow;
pub mod identity;
pub mod types;
