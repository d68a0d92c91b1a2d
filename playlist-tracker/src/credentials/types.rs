//! Core credential types.

use std::fmt;
use std::path::{Path, PathBuf};

use super::token::StoredToken;

/// Where usable credentials were found.
///
/// Sources are checked in declaration order; the first existing file wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Token provisioned by the hosting environment.
    HostToken(PathBuf),
    /// Token saved by an earlier consent flow.
    LocalToken(PathBuf),
    /// Only an OAuth client secret; consent is needed.
    ClientSecret(PathBuf),
    NotFound,
}

impl CredentialSource {
    /// File backing this source, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::HostToken(path) | Self::LocalToken(path) | Self::ClientSecret(path) => {
                Some(path)
            }
            Self::NotFound => None,
        }
    }

    pub fn is_found(&self) -> bool {
        !matches!(self, Self::NotFound)
    }
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HostToken(path) => write!(f, "host token ({})", path.display()),
            Self::LocalToken(path) => write!(f, "local token ({})", path.display()),
            Self::ClientSecret(path) => write!(f, "client secret ({})", path.display()),
            Self::NotFound => f.write_str("none"),
        }
    }
}

/// A token ready for use, tagged with the source it came from.
#[derive(Debug, Clone)]
pub struct ResolvedCredential {
    pub source: CredentialSource,
    pub token: StoredToken,
}
