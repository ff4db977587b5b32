//! Identifier types shared by portal entities

/// Primary key type
pub type Id = i64;
