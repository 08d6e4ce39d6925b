//! Fuzz target for frame decoding and dispatch
//!
//! # Invariants
//!
//! - Arbitrary bytes never panic the decoder
//! - A decoded request always gets exactly one reply
//! - Re-encoding a decoded frame reproduces its bytes

#![no_main]

use libfuzzer_sys::fuzz_target;
use reckon_core::{ServiceConfig, SessionFactory, StaticCatalog};
use reckon_harness::SimEnv;
use reckon_proto::{Frame, FrameHeader};

fuzz_target!(|data: &[u8]| {
    let Ok(frame) = Frame::decode(data) else {
        return;
    };

    let encoded = frame.to_vec();
    assert_eq!(&encoded[..], &data[..FrameHeader::SIZE + frame.payload.len()]);

    if let Ok(envelope) = frame.envelope() {
        let factory = SessionFactory::new(
            StaticCatalog::default(),
            SimEnv::new(),
            ServiceConfig { pending_one_in: 0 },
        );
        let connection = factory.create();
        let reply = connection.dispatch(envelope);
        assert!(Frame::response(frame.header.call_id(), &reply).is_ok());
    }
});
