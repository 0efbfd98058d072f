//! Lightweight STOMP 1.2 frame codec
//!
//! Provides a streaming parser for STOMP frames as they arrive over a
//! WebSocket (or any byte transport) plus an encoder for outgoing frames.
//! The parser accumulates bytes and yields complete [`Frame`]s; heart-beat
//! newlines between frames are skipped.
//!
//! This crate only depends on `thiserror` and `tracing` so the realtime
//! client can share it without pulling in the transport stack.

mod frame;
mod parser;

pub use frame::{Command, Frame, FrameError};
pub use parser::{FrameParser, DEFAULT_MAX_FRAME_SIZE};
