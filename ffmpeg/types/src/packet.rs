/*!
    Encoded packet types.
*/

use crate::Rational;

/// Presentation or decode timestamp, in ticks of some time base.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pts(pub i64);

/// Duration in ticks of some time base.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MediaDuration(pub i64);

/**
    The kind of elementary stream a packet or track belongs to.
*/
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamType {
    Video,
    Audio,
}

/**
    A compressed packet as produced by an encoder.

    Timestamps are expressed in `time_base`, which is the encoder's time
    base. The sink rescales them to the container stream's time base.
*/
#[derive(Clone, Debug)]
pub struct Packet {
    pub data: Vec<u8>,
    pub pts: Option<Pts>,
    pub dts: Option<Pts>,
    pub duration: MediaDuration,
    pub time_base: Rational,
    pub is_keyframe: bool,
    pub stream_type: StreamType,
}
