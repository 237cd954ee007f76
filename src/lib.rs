//! Guest Bridge - supervise a headless VM guest and bridge its surface
//! protocol to disk.

pub mod bridge;
pub mod config;
pub mod guest;
pub mod supervisor;
