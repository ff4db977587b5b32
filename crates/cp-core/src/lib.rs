//! # cp-core
//!
//! Core types, errors, and configuration for the consulting portal.
//!
//! This crate provides the building blocks shared by every other crate:
//! - The error taxonomy (`CoreError`) and `CoreResult` alias
//! - The `Id` primary key type
//! - The resolved request `Principal` and its `Role`
//! - The closed `EntityKind` enumeration for the project hierarchy
//! - Application configuration

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use error::*;
pub use traits::*;
pub use types::*;
