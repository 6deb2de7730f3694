//! Individual steps of the update process.
//!
//! Each step is a leaf: it touches the network or the filesystem and knows
//! nothing about the orchestrator that sequences them.

pub mod download;
pub mod extract;
pub mod launch;
pub mod promote;
pub mod verify;
