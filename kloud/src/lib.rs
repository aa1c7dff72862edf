#![doc = include_str!("../README.md")]

#[cfg(feature = "oss")]
pub mod oss;

/// AccessKey related definitions
#[cfg(feature = "oss")]
pub mod credentials;
