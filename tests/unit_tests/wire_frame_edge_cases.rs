use bytes::{Bytes, BytesMut};
use cluster_rpc_client::wire::{Frame, FrameCodec};
use tokio_util::codec::{Decoder, Encoder};
use uuid::Uuid;

#[test]
fn empty_body_round_trips() {
    let mut codec = FrameCodec;
    let frame = Frame::new(Uuid::new_v4(), "Heartbeat", 0, Bytes::new());
    let mut buf = BytesMut::new();
    codec.encode(frame.clone(), &mut buf).expect("encode ok");

    let decoded = codec.decode(&mut buf).expect("decode ok").expect("frame present");
    assert_eq!(decoded, frame);
    assert!(decoded.body.is_empty());
}

#[test]
fn empty_request_name_round_trips() {
    let mut codec = FrameCodec;
    let frame = Frame::new(Uuid::new_v4(), "", 5, Bytes::from_static(b"body"));
    let mut buf = BytesMut::new();
    codec.encode(frame.clone(), &mut buf).expect("encode ok");

    let decoded = codec.decode(&mut buf).expect("decode ok").expect("frame present");
    assert_eq!(decoded.request_name, "");
    assert_eq!(decoded, frame);
}

#[test]
fn non_ascii_request_name_round_trips() {
    let mut codec = FrameCodec;
    let frame = Frame::new(Uuid::new_v4(), "\u{30c6}\u{30b9}\u{30c8}", 0, Bytes::from_static(b"x"));
    let mut buf = BytesMut::new();
    codec.encode(frame.clone(), &mut buf).expect("encode ok");

    let decoded = codec.decode(&mut buf).expect("decode ok").expect("frame present");
    assert_eq!(decoded.request_name, frame.request_name);
}

#[test]
fn decode_rejects_a_frame_too_short_to_hold_its_own_header() {
    let mut codec = FrameCodec;
    // total_len (10) claims fewer bytes than the fixed header fields
    // (correlation id + priority + name_len = 22 bytes) require.
    let mut buf = BytesMut::new();
    buf.extend_from_slice(&10u32.to_be_bytes());
    buf.extend_from_slice(&[0u8; 10]);
    assert!(codec.decode(&mut buf).is_err());
}

#[test]
fn decoder_waits_for_more_bytes_on_empty_buffer() {
    let mut codec = FrameCodec;
    let mut buf = BytesMut::new();
    assert!(codec.decode(&mut buf).expect("no error on empty input").is_none());
}
