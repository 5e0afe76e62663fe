//! Core data model types: the part tree, message sources, and attachment metadata.

pub mod attachment;
pub mod message;
pub mod part;
