//! Infrastructure layer: persistence, configuration and the application
//! service that ties the ledger to them.

pub mod config;
pub mod service;
pub mod store;

pub use config::{ConfigError, PettyCashConfig};
pub use service::{PettyCashService, ServiceError, UserWithdrawal};
pub use store::{DepositStore, InMemoryDepositStore, StoreError};
