/*!
    Packet draining shared by the video and audio encoders.
*/

use ffmpeg_next::{codec::encoder::Encoder as EncoderFFmpeg, util::error::EAGAIN};

use ffmpeg_types::{Error, MediaDuration, Packet, Pts, Rational, Result, StreamType};

/**
    Receive every packet the encoder has ready.

    Stops when the encoder asks for more input or reports end of stream.
*/
pub(crate) fn receive_packets(
    encoder: &mut EncoderFFmpeg,
    time_base: Rational,
    stream_type: StreamType,
) -> Result<Vec<Packet>> {
    let mut packets = Vec::new();
    let mut encoded_pkt = ffmpeg_next::Packet::empty();

    loop {
        match encoder.receive_packet(&mut encoded_pkt) {
            Ok(()) => packets.push(convert_packet(&encoded_pkt, time_base, stream_type)),
            Err(ffmpeg_next::Error::Other { errno }) if errno == EAGAIN => break,
            Err(ffmpeg_next::Error::Eof) => break,
            Err(e) => return Err(Error::codec(e.to_string())),
        }
    }

    Ok(packets)
}

/**
    Convert an FFmpeg packet to our Packet type.
*/
fn convert_packet(
    pkt: &ffmpeg_next::Packet,
    time_base: Rational,
    stream_type: StreamType,
) -> Packet {
    Packet {
        data: pkt.data().map(|d| d.to_vec()).unwrap_or_default(),
        pts: pkt.pts().map(Pts),
        dts: pkt.dts().map(Pts),
        duration: MediaDuration(pkt.duration()),
        time_base,
        is_keyframe: pkt.is_key(),
        stream_type,
    }
}
