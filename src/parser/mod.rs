//! Email parsing: RFC 822 bytes and `.eml` files to part trees.

pub mod eml;
pub mod mime;
