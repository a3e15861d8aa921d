//! These models represent what the rest of the application observes about a conversation.
//!
//! The agent backend speaks its own wire format (see `protocol`), which is converted into
//! these types as soon as a frame is decoded. A `Message` is an immutable snapshot: every
//! accumulator operation hands back a fresh value, so a snapshot held by a renderer never
//! changes underneath it.
pub mod content;
pub mod message;
pub mod role;
