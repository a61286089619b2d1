use std::collections::BTreeMap;

use crate::from_bytes::TryConsumeBytes;
use crate::{Cursor, TryFromBytes};

/// Message Code
pub mod code;

/// Message parsing errors
pub mod parse_error;

/// Message ID
pub mod id;

/// Message Options
pub mod opt;

/// Message Type
pub mod ty;

/// Message Token
pub mod token;

/// Message Version
pub mod ver;

pub use code::*;
pub use id::*;
pub use opt::*;
pub use parse_error::*;
pub use token::*;
pub use ty::*;
pub use ver::*;

/// Message payload; in http terms the request or response body.
///
/// See [RFC7252 - Message Format](https://datatracker.ietf.org/doc/html/rfc7252#section-5.5)
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd)]
pub struct Payload(pub Vec<u8>);

/// Options in a message, keyed by [`OptNumber`].
///
/// Each entry holds every value supplied for that number,
/// in the order they appear on the wire.
pub type OptionMap = BTreeMap<OptNumber, Vec<OptValue>>;

/// Struct representing the first byte of a message.
///
/// ```text
/// CoAP version
/// |
/// |  Message type (request, response, empty)
/// |  |
/// |  |  Length of token, in bytes. (4-bit integer)
/// |  |  |
/// vv vv vvvv
/// 01 00 0000
/// ```
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub(crate) struct Byte1 {
  pub(crate) ver: Version,
  pub(crate) ty: Type,
  pub(crate) tkl: u8,
}

impl TryFrom<u8> for Byte1 {
  type Error = MessageParseError;

  fn try_from(b: u8) -> Result<Self, Self::Error> {
    let ver = b >> 6; // bits 0 & 1
    let ty = b >> 4 & 0b11; // bits 2 & 3
    let tkl = b & 0b1111u8; // last 4 bits

    Ok(Byte1 { ver: Version(ver),
               ty: Type::try_from(ty)?,
               tkl })
  }
}

/// # `Message` struct
/// Low-level representation of a message that has been parsed from the raw binary format.
///
/// Messages support both serializing to bytes and from bytes, by using the provided [`TryFromBytes`] and [`crate::TryIntoBytes`] traits.
///
/// ```
/// use kta_msg::*;
/// # //                       version  token len  code (2.05 Content)
/// # //                       |        |          /
/// # //                       |  type  |         /  message ID
/// # //                       |  |     |        |   |
/// # //                       vv vv vvvv vvvvvvvv vvvvvvvvvvvvvvvv
/// # let header: [u8; 4] = 0b_01_00_0001_01000101_0000000000000001u32.to_be_bytes();
/// # let token: [u8; 1] = [254u8];
/// # let content_format: &[u8] = b"application/json";
/// # let options: [&[u8]; 2] = [&[0b_1100_1101u8, 0b00000011u8], content_format];
/// # let payload: [&[u8]; 2] = [&[0b_11111111u8], b"hello, world!"];
/// let packet: Vec<u8> = /* bytes! */
/// # [header.as_ref(), token.as_ref(), options.concat().as_ref(), payload.concat().as_ref()].concat();
///
/// let msg = Message::try_from_bytes(packet).unwrap();
///
/// assert_eq!(msg.id, Id(1));
/// assert_eq!(msg.code, Code::new(2, 5));
/// assert_eq!(msg.token, Token::from_slice(&[254]));
/// assert_eq!(msg.payload(), b"hello, world!");
/// ```
#[derive(Clone, PartialEq, Debug)]
pub struct Message {
  /// see [`Id`] for details
  pub id: Id,
  /// see [`Type`] for details
  pub ty: Type,
  /// see [`Version`] for details
  pub ver: Version,
  /// see [`Token`] for details
  pub token: Token,
  /// see [`Code`] for details
  pub code: Code,
  /// see [`OptionMap`] for details
  pub opts: OptionMap,
  /// see [`Payload`]
  pub payload: Payload,
}

impl Message {
  /// Create a message with no options and an empty payload
  pub fn new(ty: Type, code: Code, id: Id, token: Token) -> Self {
    Self { id,
           ty,
           code,
           token,
           ver: Version::default(),
           opts: OptionMap::new(),
           payload: Payload::default() }
  }

  /// Create a new message that ACKs this one.
  ///
  /// The ACK is empty (code 0.00), and echoes this message's
  /// [`Id`] and [`Token`].
  ///
  /// ```
  /// use kta_msg::*;
  ///
  /// let con = Message::new(Type::Con, Code::new(2, 5), Id(7), Token::from_slice(&[1]));
  /// let ack = con.ack();
  ///
  /// assert_eq!(ack.ty, Type::Ack);
  /// assert_eq!(ack.id, Id(7));
  /// assert_eq!(ack.code, Code::EMPTY);
  /// ```
  pub fn ack(&self) -> Self {
    Self::new(Type::Ack, Code::EMPTY, self.id, self.token)
  }

  /// Get the payload's raw bytes
  pub fn payload(&self) -> &[u8] {
    &self.payload.0
  }

  /// Get all values for an option
  pub fn get(&self, n: OptNumber) -> Option<&Vec<OptValue>> {
    self.opts.get(&n)
  }

  /// Get the first value for an option
  pub fn get_first(&self, n: OptNumber) -> Option<&OptValue> {
    self.get(n).and_then(|vs| vs.first())
  }

  /// Replace all values for an option with a single value
  pub fn set(&mut self, n: OptNumber, v: OptValue) -> Option<Vec<OptValue>> {
    self.opts.insert(n, vec![v])
  }

  /// Add a value to a repeatable option
  pub fn add(&mut self, n: OptNumber, v: OptValue) {
    self.opts.entry(n).or_default().push(v);
  }

  /// Remove an option entirely
  pub fn remove(&mut self, n: OptNumber) -> Option<Vec<OptValue>> {
    self.opts.remove(&n)
  }

  /// Set the Uri-Path, splitting on `/` into one option value per
  /// non-empty segment.
  ///
  /// ```
  /// use kta_msg::*;
  ///
  /// let mut msg = Message::new(Type::Con, Code::POST, Id(1), Token::default());
  /// msg.set_path("/a//b/");
  ///
  /// assert_eq!(msg.path(), vec!["a", "b"]);
  /// ```
  pub fn set_path(&mut self, path: &str) {
    self.remove(known::no_repeat::PATH);
    path.split('/')
        .filter(|seg| !seg.is_empty())
        .for_each(|seg| self.add(known::no_repeat::PATH, OptValue(seg.as_bytes().to_vec())));
  }

  /// Get the Uri-Path segments, skipping any that are not valid UTF-8
  pub fn path(&self) -> Vec<&str> {
    self.get(known::no_repeat::PATH)
        .map(|vs| {
          vs.iter()
            .filter_map(|v| core::str::from_utf8(&v.0).ok())
            .collect()
        })
        .unwrap_or_default()
  }

  /// Set the Content-Format option
  pub fn set_content_format(&mut self, f: ContentFormat) {
    self.set(known::no_repeat::CONTENT_FORMAT,
             OptValue::uint(u16::from(&f).into()));
  }

  /// Get the Content-Format option
  pub fn content_format(&self) -> Option<ContentFormat> {
    self.get_first(known::no_repeat::CONTENT_FORMAT)
        .and_then(OptValue::as_uint)
        .and_then(|n| u16::try_from(n).ok())
        .map(ContentFormat::from)
  }

  /// Set the Block1 option (block-wise request body)
  pub fn set_block1(&mut self, b: Block) {
    self.set(known::no_repeat::BLOCK1, OptValue::uint(b.into()));
  }

  /// Get the Block1 option
  pub fn block1(&self) -> Option<Block> {
    self.get_first(known::no_repeat::BLOCK1)
        .and_then(OptValue::as_uint)
        .map(Block::from)
  }

  /// Set the Block2 option (block-wise response body)
  pub fn set_block2(&mut self, b: Block) {
    self.set(known::no_repeat::BLOCK2, OptValue::uint(b.into()));
  }

  /// Get the Block2 option
  pub fn block2(&self) -> Option<Block> {
    self.get_first(known::no_repeat::BLOCK2)
        .and_then(OptValue::as_uint)
        .map(Block::from)
  }

  /// Set the Size1 option (total size of a block-wise request body)
  pub fn set_size1(&mut self, size: u32) {
    self.set(known::no_repeat::SIZE1, OptValue::uint(size));
  }

  /// Get the Size2 option (total size of a block-wise response body)
  pub fn size2(&self) -> Option<u32> {
    self.get_first(known::no_repeat::SIZE2)
        .and_then(OptValue::as_uint)
  }
}

impl<Bytes: AsRef<[u8]>> TryFromBytes<Bytes> for Message {
  type Error = MessageParseError;

  fn try_from_bytes(bytes: Bytes) -> Result<Self, Self::Error> {
    let mut bytes = Cursor::new(bytes);

    let Byte1 { tkl, ty, ver } = bytes.next().ok_or_else(MessageParseError::eof)?.try_into()?;

    if ver != Version::default() {
      return Err(Self::Error::InvalidVersion(ver.0));
    }

    if tkl > 8 {
      return Err(Self::Error::InvalidTokenLength(tkl));
    }

    let code: Code = bytes.next().ok_or_else(MessageParseError::eof)?.into();
    let id: Id = Id::try_consume_bytes(&mut bytes)?;

    let token = bytes.take_exact(tkl as usize)
                     .ok_or_else(MessageParseError::eof)?;
    let token = Token::from_slice(token);

    let opts = OptionMap::try_consume_bytes(&mut bytes).map_err(Self::Error::OptParseError)?;

    // a payload marker followed by nothing is a format error
    let payload = match bytes.next() {
      | None => Payload::default(),
      | Some(_) if bytes.is_exhausted() => return Err(Self::Error::EmptyPayloadAfterMarker),
      | Some(_) => Payload(bytes.take_until_end().to_vec()),
    };

    Ok(Message { id,
                 ty,
                 ver,
                 code,
                 token,
                 opts,
                 payload })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parse_msg() {
    let (expect, msg) = crate::test_msg();
    assert_eq!(Message::try_from_bytes(&msg).unwrap(), expect)
  }

  #[test]
  fn parse_byte1() {
    let byte = 0b_01_10_0011u8;
    let byte = Byte1::try_from(byte).unwrap();
    assert_eq!(byte,
               Byte1 { ver: Version(1),
                       ty: Type::Ack,
                       tkl: 3 })
  }

  #[test]
  fn parse_id() {
    let mut id_bytes = Cursor::new(34u16.to_be_bytes());
    let id = Id::try_consume_bytes(&mut id_bytes).unwrap();
    assert_eq!(id, Id(34));
  }

  #[test]
  fn parse_rejects_bad_header() {
    assert_eq!(Message::try_from_bytes([0u8; 0]), Err(MessageParseError::UnexpectedEndOfStream));
    assert_eq!(Message::try_from_bytes([0b01_00_1001u8, 0, 0, 1]),
               Err(MessageParseError::InvalidTokenLength(9)));
    assert_eq!(Message::try_from_bytes([0b10_00_0000u8, 0, 0, 1]),
               Err(MessageParseError::InvalidVersion(2)));
    assert_eq!(Message::try_from_bytes([0b01_00_0010u8, 0, 0, 1, 9]),
               Err(MessageParseError::UnexpectedEndOfStream));
  }

  #[test]
  fn parse_rejects_marker_without_payload() {
    assert_eq!(Message::try_from_bytes([0b01_00_0000u8, 0b010_00101, 0, 1, 0xFF]),
               Err(MessageParseError::EmptyPayloadAfterMarker));
  }

  #[test]
  fn empty_ack() {
    let msg = Message::try_from_bytes([0b01_10_0000u8, 0, 0, 9]).unwrap();
    assert_eq!(msg.ty, Type::Ack);
    assert_eq!(msg.code, Code::EMPTY);
    assert_eq!(msg.id, Id(9));
    assert!(msg.payload().is_empty());
  }

  #[test]
  fn block_options() {
    let mut msg = Message::new(Type::Con, Code::POST, Id(1), Token::default());
    assert_eq!(msg.block2(), None);

    msg.set_block2(Block::new(1024, 2, true));
    msg.set_block1(Block::new(64, 0, false));

    assert_eq!(msg.block2(), Some(Block::new(1024, 2, true)));
    assert_eq!(msg.block1().map(|b| b.size()), Some(64));
  }

  #[test]
  fn content_format() {
    let mut msg = Message::new(Type::Con, Code::POST, Id(1), Token::default());
    msg.set_content_format(ContentFormat::OctetStream);
    assert_eq!(msg.get_first(known::no_repeat::CONTENT_FORMAT),
               Some(&OptValue(vec![42])));
    assert_eq!(msg.content_format(), Some(ContentFormat::OctetStream));
  }
}
