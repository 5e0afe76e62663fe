//! `mailrender`: render email MIME part trees to text.
//!
//! This crate provides a two-pass renderer over a parsed message's part
//! tree, the attachment collectors built on it, a small template engine,
//! and a `mail-parser` adapter that builds part trees from raw messages.

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;
pub mod render;
pub mod store;
