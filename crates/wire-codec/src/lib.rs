//! # wire-codec
//!
//! Envelope types and the JSON codec for frames delivered by the hosted
//! pubsub client.
//!
//! A frame is a JSON object with a `type` discriminator. Only `MESSAGE`
//! frames carry a `data` envelope with a `topic` and a `message`, and the
//! `message` is itself a JSON document encoded as a string:
//!
//! ```text
//! {"type":"MESSAGE","data":{"topic":"video-playback.123","message":"{\"views\":4}"}}
//! ```
//!
//! ## Quick start
//!
//! ```rust
//! use wire_codec::{decode, split_topic, RawMessage};
//!
//! let raw: RawMessage = wire_codec::parse_frame(
//!     r#"{"type":"MESSAGE","data":{"topic":"a.b.c","message":"{\"x\":1}"}}"#,
//! ).unwrap();
//! let data = raw.structured().unwrap();
//! let parts = split_topic(data.topic());
//! assert_eq!(parts.prefix, "a");
//! assert_eq!(parts.trailer, "b.c");
//! assert_eq!(decode(data.message()).unwrap()["x"], 1);
//! ```

mod codec;
mod frame;
mod topic;

pub use codec::{decode, encode, parse_frame, render_frame, DecodeError, EncodeError};
pub use frame::{MessageData, RawMessage, MESSAGE_FRAME};
pub use topic::{split_topic, TopicParts, TOPIC_SEPARATOR};
