//! Akoma Ntoso 3.0 output for legis-rs.
//!
//! - [`TypeMapper`] normalizes oracle-discovered type strings into the AKN
//!   hierarchical-element vocabulary, with jurisdiction aliases and a total
//!   fallback.
//! - [`AknSerializer`] walks a hierarchy tree depth-first and emits AKN XML
//!   with stable path-based `eId` identifiers and FRBR metadata.

pub mod serializer;
pub mod vocabulary;

pub use serializer::{AknError, AknOptions, AknSerializer, Result};
pub use vocabulary::TypeMapper;
