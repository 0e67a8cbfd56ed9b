//! Table Mailer: build styled table reports concurrently and mail them as
//! attachments.

pub mod config;
pub mod error;
pub mod mail;
pub mod pipeline;
pub mod render;
pub mod runner;
pub mod table;
