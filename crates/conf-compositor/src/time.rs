//! Wall-clock timestamps stamped onto server-synthesized media (§4.1's
//! `timestamp` field is "sender wall-clock, ms since epoch" — for
//! composed/mixed output the server is the sender).

use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
