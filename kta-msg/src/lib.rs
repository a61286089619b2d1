//! Low-level representation of CoAP messages.
//!
//! The most notable item in `kta_msg` is [`Message`];
//! a CoAP message very close to the actual byte layout, backed by
//! `Vec` for the payload and a `BTreeMap` of option numbers to values.
//!
//! Keeping options in a sorted map means serializing is always in
//! ascending option number order, which is what the delta encoding
//! of RFC7252 section 3.1 requires.
//!
//! ```
//! use kta_msg::{known, Code, ContentFormat, Id, Message, Token, TryFromBytes, TryIntoBytes, Type};
//!
//! let mut msg = Message::new(Type::Con, Code::POST, Id(1), Token::from_slice(&[1, 2, 3, 4]));
//! msg.set_path("provisioning/v1");
//! msg.set_content_format(ContentFormat::OctetStream);
//! msg.payload = kta_msg::Payload(b"ping".to_vec());
//!
//! let bytes: Vec<u8> = msg.clone().try_into_bytes().unwrap();
//! let parsed = Message::try_from_bytes(&bytes).unwrap();
//!
//! assert_eq!(parsed, msg);
//! assert_eq!(parsed.get(known::no_repeat::PATH).map(|vs| vs.len()), Some(2));
//! ```

#![doc(html_root_url = "https://docs.rs/kta-msg/0.3.0")]
#![cfg_attr(any(docsrs, feature = "docs"), feature(doc_cfg))]
#![cfg_attr(not(test), forbid(missing_debug_implementations, unreachable_pub))]
#![cfg_attr(not(test), deny(unsafe_code, missing_copy_implementations))]
#![deny(missing_docs)]

/// A cursor over a byte buffer
pub mod cursor;

#[doc(hidden)]
pub mod from_bytes;

/// Message structs
pub mod msg;

#[doc(hidden)]
pub mod to_bytes;

#[doc(inline)]
pub use cursor::Cursor;
#[doc(inline)]
pub use from_bytes::TryFromBytes;
#[doc(inline)]
pub use msg::*;
#[doc(inline)]
pub use to_bytes::{GetSize, MessageToBytesError, TryIntoBytes};

#[cfg(test)]
pub(crate) fn test_msg() -> (Message, Vec<u8>) {
  use std::collections::BTreeMap;

  let header: [u8; 4] = 0b0100_0001_0100_0101_0000_0000_0000_0001_u32.to_be_bytes();
  let token: [u8; 1] = [254u8];
  let content_format: &[u8] = b"application/json";
  let options: [&[u8]; 2] = [&[0b_1100_1101u8, 0b00000011u8], content_format];
  let payload: [&[u8]; 2] = [&[0b1111_1111_u8], b"hello, world!"];
  let bytes = [header.as_ref(),
               token.as_ref(),
               options.concat().as_ref(),
               payload.concat().as_ref()].concat();

  let msg = Message { id: Id(1),
                      ty: Type::Con,
                      ver: Version(1),
                      token: Token(tinyvec::array_vec!([u8; 8] => 254)),
                      opts: BTreeMap::from([(OptNumber(12),
                                             vec![OptValue(content_format.to_vec())])]),
                      code: Code { class: 2,
                                   detail: 5 },
                      payload: Payload(b"hello, world!".to_vec()) };
  (msg, bytes)
}
