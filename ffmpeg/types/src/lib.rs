/*!
    Shared types for the ffmpeg crate ecosystem.

    This crate defines the vocabulary of the ecosystem: the types that cross crate
    boundaries between the transform, encode and sink crates. It has no dependency
    on FFmpeg, so consumers such as the frame pipeline core can use timestamps,
    formats and errors without pulling in FFmpeg bindings.
*/

mod codec;
mod error;
mod format;
mod packet;
mod rational;

pub use codec::CodecId;
pub use error::{Error, Result};
pub use format::{ChannelLayout, PixelFormat, SampleFormat};
pub use packet::{MediaDuration, Packet, Pts, StreamType};
pub use rational::Rational;
