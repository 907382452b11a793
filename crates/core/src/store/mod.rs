//! Backend store abstraction.
//!
//! A "store" is a debrid-style content provider that can report, per
//! info-hash, whether it already holds usable data. The wire protocols differ
//! per provider; this module pins the contract the resolution engine consumes
//! (`StoreBackend`) and ships the TorBox client.

mod torbox;
mod types;

pub use torbox::TorboxStore;
pub use types::*;
