//! `pettycash-auth`: pure authentication/authorization boundary.
//!
//! Decoupled from HTTP and storage: callers build a `Principal` from verified
//! claims and check it before invoking any mutating ledger operation.

pub mod authorize;
pub mod claims;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, CommandAuthorization, Principal, authorize, authorize_branch};
pub use claims::{Hs256JwtValidator, JwtClaims, JwtValidator, TokenValidationError, validate_claims};
pub use permissions::Permission;
pub use principal::Membership;
pub use roles::{Role, permissions_for_roles};
