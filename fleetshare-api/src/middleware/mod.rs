pub mod credentials;

pub use credentials::{CredentialResolver, CredentialSource, HostClaims, HostIdentity};
