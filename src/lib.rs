//! Cycle-level simulator of private caches kept coherent over one shared snooping bus.
//!
//! Each processor replays a memory trace against its own set-associative cache. Caches follow one
//! of four coherence policies (MSI, MESI, MUSI, Dragon) and talk to each other only through the
//! [`bus::Bus`], which arbitrates round-robin and charges every transaction a fixed cycle cost.

pub mod bus;
pub mod cache;
pub mod coherence;
pub mod error;
pub mod processor;
pub mod sim;
pub mod stats;
pub mod timeq;

#[cfg(test)]
mod unit_tests;
