//! Database query functions organized by domain.

pub mod prices;
pub mod rebases;
pub mod settings;
