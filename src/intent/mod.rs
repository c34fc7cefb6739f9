//! Intent definitions: loading, dependency mapping, and session handshake.

pub mod handshake;
pub mod map;
pub mod store;

pub use handshake::select_intent;
pub use map::IntentMap;
pub use store::{Intent, IntentStore};
