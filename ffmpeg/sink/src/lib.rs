/*!
    Media output and muxing for the ffmpeg crate ecosystem.

    This crate handles the output side of the media pipeline. It takes encoded
    packets from the encoder and writes them into the container format the
    output path names: MP4, MKV, MOV and anything else FFmpeg can mux.

    ```ignore
    use ffmpeg_sink::Sink;
    use ffmpeg_types::StreamType;

    let mut sink = Sink::create("out.mp4")?;
    let codec = sink.default_codec(StreamType::Video).expect("not a video container");
    let index = sink.add_stream(codec)?;

    // Open an encoder, honoring sink.needs_global_header(), then:
    sink.set_stream_parameters(index, encoder.parameters(), encoder.time_base())?;
    sink.write_header()?;

    for packet in packets {
        sink.write(&packet)?;
    }
    sink.finish()?;
    ```
*/

pub use ffmpeg_types::{CodecId, Error, Packet, Rational, Result, StreamType};

mod sink;

pub use sink::Sink;
