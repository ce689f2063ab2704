//! Session Pool & Connection Manager (spec §4.9), Permission Gate (spec
//! §4.10), and the domain error taxonomy (spec §7) that the pool's error
//! translation speaks.

pub mod config;
pub mod error;
pub mod permission;
pub mod pool;
pub mod telemetry;

pub use config::{Config, LogLevel};
pub use error::{DomainError, DomainResult};
pub use permission::{check_class_permissions, has_record_access, Group, Operation, User};
pub use pool::{with_session, Session, SessionPool};
