//! Credential management module.
//!
//! # Architecture
//!
//! - [`CredentialSource`]: which credential file was found, in priority order
//! - [`CredentialResolver`]: checks the sources and produces a usable token
//! - [`ConsentFlow`]: interactive OAuth consent when only a client secret exists
//! - [`StoredToken`]: the on-disk authorized-user token document
//! - [`RefreshingToken`]: hands out access tokens to the Data API client

mod consent;
mod error;
mod resolver;
mod token;
mod types;

pub use consent::{ClientSecrets, ConsentFlow, InstalledAppFlow, YOUTUBE_READONLY_SCOPE};
#[cfg(test)]
pub use consent::MockConsentFlow;
pub use error::CredentialError;
pub use resolver::CredentialResolver;
pub use token::{RefreshingToken, StoredToken};
pub use types::{CredentialSource, ResolvedCredential};
