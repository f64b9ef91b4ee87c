//! Interface versioning.

use serde::{Deserialize, Serialize};

use crate::proto::VersionReply;

/// Version of the ETHBACKEND interface this client was built against.
pub const ETH_BACKEND_API_VERSION: ServiceVersion = ServiceVersion::new(3, 1, 0);

/// Semantic version of a service interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl ServiceVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Whether a server exposing `remote` can serve a client built against `self`.
    ///
    /// Major versions must be equal and the server must be at least as new
    /// as the client within that major version.
    pub fn is_compatible_with(&self, remote: &ServiceVersion) -> bool {
        if remote.major != self.major {
            return false;
        }
        (remote.minor, remote.patch) >= (self.minor, self.patch)
    }
}

impl std::fmt::Display for ServiceVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl From<VersionReply> for ServiceVersion {
    fn from(reply: VersionReply) -> Self {
        Self::new(reply.major, reply.minor, reply.patch)
    }
}

impl From<ServiceVersion> for VersionReply {
    fn from(v: ServiceVersion) -> Self {
        Self {
            major: v.major,
            minor: v.minor,
            patch: v.patch,
        }
    }
}
