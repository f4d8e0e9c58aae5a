//! The log store owns the list of completed runs and the rate table.
//!
//!  - Both lists live in memory and are written out as whole JSON documents on every mutation.
//!  - The durable medium is abstracted by [key_value::KeyValueStore].
//!  - Summaries are recomputed after every mutation and published to subscribers.

pub mod entities;
pub mod key_value;
pub mod log_store;
