#![no_main]
#[macro_use]
extern crate libfuzzer_sys;
extern crate evhttp;

use evhttp::parser::{parse, request_length, Framing, Parsed};

fuzz_target!(|data: &[u8]| {
    // Framing and parsing must agree: a parsed message's head is exactly the
    // framed prefix, and neither may read out of bounds.
    let framed = request_length(data);
    match parse(data) {
        Parsed::Complete(hm) => {
            assert_eq!(framed, Framing::Complete(hm.head.len()));
            assert!(hm.head.len() <= data.len());
            assert!(hm.body.len() <= data.len() - hm.head.len());
        }
        Parsed::Partial => assert_eq!(framed, Framing::Partial),
        Parsed::Invalid => {}
    }
});
