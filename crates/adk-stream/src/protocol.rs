//! Wire formats spoken with the agent backend.
//!
//! Outbound, a `RunRequest` is posted as JSON. Inbound, the response body is a stream of
//! `data: {json}` lines which `EventDecoder` turns into `Frame`s, and `map_event` turns
//! each frame's payload into fragments for the message accumulator.
pub mod decoder;
pub mod event;
pub mod mapper;
pub mod request;

pub use decoder::{decode_stream, DecoderStats, EventDecoder, Frame};
pub use event::StreamEvent;
pub use mapper::{map_event, MappedEvent};
pub use request::{InlineData, NewMessage, Part, RunRequest};
