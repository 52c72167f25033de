//! Offline HTTP response decoding
//!
//! Used to replay saved proxy or scanner dumps, never on the live scan path.

mod response;

pub use response::{parse_response, DecodeError, HttpVersion, RawResponse};
