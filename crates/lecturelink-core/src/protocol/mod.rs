//! Protocol module containing the line codec.

pub mod line;

pub use line::{
    decode_line, encode_line, reply_to, reverse_line, ProtocolError, Reply, DEFAULT_PORT,
    LINE_TERMINATOR, MAX_LINE_BYTES,
};
