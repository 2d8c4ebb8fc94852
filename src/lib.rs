//! Validation and lifecycle engine for ACH files.
//!
//! Files arrive as flat NACHA text or JSON ([`encoding`]), are checked for
//! routing-number check digits ([`routing`]) and stale effective dates
//! ([`temporal`]), and are kept in a [`store::FileStore`] by the
//! [`service::FileService`].

pub mod config;
pub mod encoding;
pub mod error;
pub mod file;
pub mod lifecycle;
pub mod metrics;
pub mod nacha;
pub mod routing;
pub mod service;
pub mod store;
pub mod temporal;
pub mod utils;

pub use encoding::ContentKind;
pub use error::{CreateError, FileError, ValidationError};
pub use file::File;
pub use service::FileService;
