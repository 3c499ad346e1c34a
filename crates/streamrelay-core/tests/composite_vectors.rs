//! Composite binary frame vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::fs;

use bytes::Bytes;

use streamrelay_core::protocol::{decode, encode_composite, DecodedFrame, RawFrame};

use vector_loader::TestVector;

fn load(name: &str) -> TestVector {
    let s = fs::read_to_string(format!("tests/vectors/{name}")).unwrap();
    serde_json::from_str(&s).unwrap()
}

#[test]
fn composite_vectors() {
    let files = [
        "composite_ok.json",
        "composite_video_b64.json",
        "composite_empty_media.json",
        "composite_too_short.json",
        "composite_overlong.json",
        "composite_bad_metadata.json",
    ];

    for f in files {
        let v = load(f);
        let raw = v.frame.decode();
        let res = decode(RawFrame::Binary(Bytes::from(raw)));

        if let Some(err) = v.expect_error {
            let e = res.expect_err("expected error");
            assert_eq!(e.client_code().as_str(), err.code, "vector={}", v.description);
            continue;
        }

        let ex = v.expect.expect("missing expect block");
        let DecodedFrame::Composite(frame) = res.expect("expected ok frame") else {
            panic!("vector={} did not decode as composite", v.description);
        };

        assert_eq!(frame.metadata, ex["metadata"], "vector={}", v.description);
        assert_eq!(frame.media.len() as u64, ex["media_len"].as_u64().unwrap(), "vector={}", v.description);
    }
}

#[test]
fn encoder_reproduces_vector_bytes() {
    let v = load("composite_ok.json");
    let encoded = encode_composite(&serde_json::json!({"message": "hi"}), b"abc").unwrap();
    assert_eq!(encoded.as_ref(), v.frame.decode().as_slice());
}

#[test]
fn round_trip_preserves_arbitrary_payloads() {
    let metas = [
        serde_json::json!({}),
        serde_json::json!({"message": "çà unicode ✓", "nested": {"a": [1, 2, 3]}}),
        serde_json::json!(null),
    ];
    let payloads: [Vec<u8>; 3] = [vec![], (0..=255u8).collect(), vec![0; 4096]];

    for m in &metas {
        for p in &payloads {
            let frame = encode_composite(m, p).unwrap();
            match decode(RawFrame::Binary(frame)).unwrap() {
                DecodedFrame::Composite(c) => {
                    assert_eq!(&c.metadata, m);
                    assert_eq!(c.media.as_ref(), p.as_slice());
                }
                other => panic!("unexpected {other:?}"),
            }
        }
    }
}
