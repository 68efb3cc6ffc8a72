//! License application lifecycle, payments, and the client/company directory.

pub mod applications;
pub mod catalog;
pub mod directory;
pub mod documents;
pub mod ids;
pub mod memory;
pub mod payments;
