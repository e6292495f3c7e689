use crate::{
    Dimensions, FfmpegBackend, Frame, MediaBackend, SourceDescriptor, StreamRequest,
    media::ffmpeg::{
        decoder_args, delivered_fps, input_args, parse_frame_rate, parse_probe_output,
    },
};

/// WHAT: ffprobe's csv output is parsed into geometry and rate
/// WHY: The connection layer validates these before recording
#[test]
#[allow(clippy::unwrap_used)]
fn given_probe_csv_when_parsing_then_stream_info_extracted() {
    // Given: Typical ffprobe output with a trailing newline
    let output = "1920,1080,30000/1001\n";

    // When: Parsing
    let info = parse_probe_output(output).unwrap();

    // Then: Geometry and NTSC rate are recovered
    assert_eq!(info.dims, Dimensions::new(1920, 1080));
    assert!((info.fps - 29.97).abs() < 0.01);
}

/// WHAT: Garbage or truncated probe output yields nothing
/// WHY: A half-written probe must not be mistaken for a valid stream
#[test]
fn given_malformed_probe_output_when_parsing_then_none() {
    // Given/When/Then
    assert!(parse_probe_output("").is_none());
    assert!(parse_probe_output("1920,1080").is_none());
    assert!(parse_probe_output("wide,tall,25/1").is_none());
}

/// WHAT: A 0/0 frame rate parses as zero rather than failing
/// WHY: Some cameras report 0/0 and must be flagged degenerate, not unparseable
#[test]
fn given_zero_denominator_when_parsing_rate_then_zero() {
    // Given/When/Then
    assert_eq!(parse_frame_rate("0/0"), Some(0.0));
    assert_eq!(parse_frame_rate("25/1"), Some(25.0));
    assert_eq!(parse_frame_rate("15"), Some(15.0));
}

/// WHAT: rtsp inputs are forced onto TCP with a socket timeout
/// WHY: UDP drops frames behind NAT and a dead camera must not hang a read forever
#[test]
#[allow(clippy::unwrap_used)]
fn given_rtsp_address_when_building_input_args_then_tcp_transport() {
    // Given: rtsp and http addresses
    let rtsp = SourceDescriptor::new("a", "10.0.0.1", "u", "p")
        .resolve()
        .unwrap();
    let http = SourceDescriptor::new("b", "10.0.0.2", "", "")
        .with_template("http://{host}/video.mjpg")
        .resolve()
        .unwrap();

    // When: Building input options
    let rtsp_args = input_args(&rtsp);
    let http_args = input_args(&http);

    // Then: Only rtsp gets transport options
    assert_eq!(&rtsp_args[..2], ["-rtsp_transport", "tcp"]);
    assert!(http_args.is_empty());
}

/// WHAT: With a target rate set, frames are reported at exactly that rate
/// WHY: The decoder resamples to the target, so segments must be muxed at it
/// or playback drifts from wall-clock time
#[test]
fn given_target_rate_when_computing_delivered_fps_then_target_wins() {
    // Given/When/Then: Slower and faster cameras both deliver the target
    assert_eq!(delivered_fps(10.0, Some(15)), 15.0);
    assert_eq!(delivered_fps(30.0, Some(15)), 15.0);

    // No target, or a zero target, keeps the native rate
    assert_eq!(delivered_fps(25.0, None), 25.0);
    assert_eq!(delivered_fps(25.0, Some(0)), 25.0);

    // A degenerate probe stays degenerate so the connection rejects it
    assert_eq!(delivered_fps(0.0, Some(15)), 0.0);
}

/// WHAT: The decoder resamples only when a target rate is set
/// WHY: The reported rate and the `-r` option must always agree
#[test]
#[allow(clippy::unwrap_used)]
fn given_target_rate_when_building_decoder_args_then_output_rate_set() {
    // Given: The same address with and without a target rate
    let address = SourceDescriptor::new("a", "10.0.0.1", "u", "p")
        .resolve()
        .unwrap();
    let capped = StreamRequest {
        address: address.clone(),
        target_fps: Some(12),
    };
    let native = StreamRequest {
        address,
        target_fps: None,
    };

    // When: Building decoder arguments
    let capped_args = decoder_args(&capped);
    let native_args = decoder_args(&native);

    // Then: Only the capped request carries -r, placed after the input
    let r = capped_args.iter().position(|a| a == "-r").unwrap();
    let i = capped_args.iter().position(|a| a == "-i").unwrap();
    assert!(r > i);
    assert_eq!(capped_args[r + 1], "12");
    assert!(!native_args.iter().any(|a| a == "-r"));
    assert_eq!(native_args.last().map(String::as_str), Some("-"));
}

/// WHAT: A sink whose encoder cannot start leaves no file behind
/// WHY: An empty .mp4 in a partition is unplayable and looks like a recording
#[test]
#[allow(clippy::unwrap_used)]
fn given_missing_encoder_when_opening_sink_then_no_empty_file_left() {
    // Given: A backend pointing at an ffmpeg binary that does not exist
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("segment.mp4");
    let backend = FfmpegBackend::with_binaries(
        temp.path().join("no-such-ffmpeg"),
        temp.path().join("no-such-ffprobe"),
    );

    // When: Opening a sink
    let result = backend.open_sink(&path, Dimensions::new(320, 240), 15.0);

    // Then: Error, and the claimed file is gone
    assert!(result.is_err());
    assert!(!path.exists());
}

/// WHAT: Frames written through ffmpeg read back with the same geometry
/// WHY: Confirms the encoder and decoder pipes agree on the pixel format
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
#[allow(clippy::unwrap_used)]
fn given_encoded_segment_when_opening_as_stream_then_frames_decoded() {
    // Given: A two-second segment of grey 320x240 frames
    let temp = tempfile::TempDir::new().unwrap();
    let path = temp.path().join("segment.mp4");
    let backend = FfmpegBackend::default();
    let dims = Dimensions::new(320, 240);
    let mut sink = backend.open_sink(&path, dims, 15.0).unwrap();
    for _ in 0..30 {
        sink.write(&Frame::new(dims, vec![128; 320 * 240 * 3]))
            .unwrap();
    }
    sink.finalize().unwrap();

    // When: Opening the file as a stream
    let address = SourceDescriptor::new("file", path.to_string_lossy(), "", "")
        .with_template("file://{host}")
        .resolve()
        .unwrap();
    let mut source = backend
        .open_stream(&StreamRequest {
            address,
            target_fps: Some(15),
        })
        .unwrap();

    // Then: Geometry matches and frames decode
    assert_eq!(source.info().dims, dims);
    let frame = source.read().unwrap();
    assert_eq!(frame.dims, dims);
    assert_eq!(frame.data.len(), 320 * 240 * 3);
    source.close();
}
