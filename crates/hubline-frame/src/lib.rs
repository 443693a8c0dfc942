//! Length-prefixed message framing for hubline.
//!
//! Every frame on the wire is:
//! - A 4-byte big-endian length of everything that follows
//! - A 128-byte text header (`fileType:..,fileName:..,fileSize:..;`, NUL padded)
//! - The payload bytes
//!
//! [`StreamReassembler`] turns a boundary-less byte stream back into frame
//! bodies; [`decode_body`] turns a body into a [`Frame`]. No I/O happens in
//! either. [`FrameReader`] and [`FrameWriter`] are blocking adapters over any
//! `Read`/`Write`.

pub mod codec;
pub mod error;
pub mod header;
pub mod kind;
pub mod reader;
pub mod reassembler;
pub mod writer;

pub use codec::{
    decode_body, encode_frame, peek_body_len, validate_attachment_name, Frame, FrameConfig,
    DEFAULT_MAX_BODY, LENGTH_PREFIX_SIZE,
};
pub use error::{FrameError, Result};
pub use header::{WireHeader, HEADER_SIZE};
pub use kind::FrameKind;
pub use reader::FrameReader;
pub use reassembler::StreamReassembler;
pub use writer::FrameWriter;
