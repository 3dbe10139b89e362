//! Fuzz target: store response decoders
//!
//! Feeds arbitrary bytes to the body reader and every decoder the HTTP
//! store adapter uses, and asserts that none of them panic.
//!
//! cargo fuzz run fuzz_store_codec

#![no_main]

use libfuzzer_sys::fuzz_target;
use pillbox::adapters::store_codec::{
    Body, MAX_RESPONSE_BYTES, decode_affected, decode_latest_date, decode_rows, read_body,
};

fuzz_target!(|data: &[u8]| {
    // Short reads of uneven size must reassemble the body exactly.
    let mut rest = data;
    let mut step = 1;
    let body = read_body(|buf: &mut [u8]| {
        let n = rest.len().min(buf.len()).min(step);
        buf[..n].copy_from_slice(&rest[..n]);
        rest = &rest[n..];
        step = step % 97 + 13;
        Ok::<_, ()>(n)
    });
    match body {
        Ok(Body::Complete(b)) => assert_eq!(b, data),
        Ok(Body::Overflow) => assert!(data.len() > MAX_RESPONSE_BYTES),
        Err(()) => unreachable!(),
    }

    let _ = decode_latest_date(data);
    let _ = decode_affected(data);

    if let Ok(rows) = decode_rows(data) {
        for row in rows {
            // Slot validation happens later; any i32 must survive decoding.
            let _ = pillbox::app::reminder::SlotIndex::new(row.medication_slot);
        }
    }
});
