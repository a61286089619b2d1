use tinyvec::ArrayVec;

use crate::*;

/// Get the size in bytes of a structure once serialized
pub trait GetSize {
  /// Size in bytes
  fn get_size(&self) -> usize;
}

/// Trait allowing fallible conversion into bytes
pub trait TryIntoBytes {
  /// Error yielded if the conversion fails
  type Error;

  /// Try to convert into a collection of bytes
  ///
  /// ```
  /// use kta_msg::{Code, Id, Message, Token, TryIntoBytes, Type};
  ///
  /// let msg = Message::new(Type::Con, Code::POST, Id(1), Token::from_slice(&[0xAB]));
  /// let bytes: Vec<u8> = msg.try_into_bytes().unwrap();
  ///
  /// assert_eq!(bytes, vec![0b01_00_0001, 0b000_00010, 0, 1, 0xAB]);
  /// ```
  fn try_into_bytes(self) -> Result<Vec<u8>, Self::Error>;
}

/// Errors encounterable serializing to bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MessageToBytesError {
  /// An option value was longer than the option length field can express
  OptionValueTooLong {
    /// The option
    number: OptNumber,
    /// Length of the value
    len: usize,
  },
  /// The gap between two consecutive option numbers was larger than the delta field can express
  OptionDeltaTooLarge(OptNumber),
}

impl GetSize for Message {
  fn get_size(&self) -> usize {
    let header_size = 4;
    let payload_marker_size = if self.payload.0.is_empty() { 0 } else { 1 };
    let payload_size = self.payload.0.len();
    let token_size = self.token.0.len();
    let opts_size: usize = opts(&self.opts).map(|o| o.get_size()).sum();

    header_size + payload_marker_size + payload_size + token_size + opts_size
  }
}

/// Flatten an option map into wire-order options with deltas
fn opts(map: &OptionMap) -> impl Iterator<Item = Opt> + '_ {
  map.iter()
     .flat_map(|(n, vs)| vs.iter().map(move |v| (*n, v)))
     .scan(0u32, |prev, (n, v)| {
       let delta = n.0 - *prev;
       *prev = n.0;
       Some(Opt { delta: OptDelta(u16::try_from(delta).unwrap_or(u16::MAX)),
                  value: v.clone() })
     })
}

fn check_opts(map: &OptionMap) -> Result<(), MessageToBytesError> {
  let mut prev = 0u32;
  for (n, vs) in map.iter() {
    if n.0 - prev > u32::from(u16::MAX) {
      return Err(MessageToBytesError::OptionDeltaTooLarge(*n));
    }

    if let Some(v) = vs.iter().find(|v| v.0.len() > usize::from(u16::MAX)) {
      return Err(MessageToBytesError::OptionValueTooLong { number: *n,
                                                          len: v.0.len() });
    }

    prev = n.0;
  }

  Ok(())
}

impl TryIntoBytes for Message {
  type Error = MessageToBytesError;

  fn try_into_bytes(self) -> Result<Vec<u8>, Self::Error> {
    check_opts(&self.opts)?;

    let mut bytes = Vec::with_capacity(self.get_size());

    let byte1: u8 = Byte1 { tkl: self.token.0.len() as u8,
                            ver: self.ver,
                            ty: self.ty }.into();
    let code: u8 = self.code.into();
    let id: [u8; 2] = self.id.into();

    bytes.push(byte1);
    bytes.push(code);

    bytes.extend(id);
    bytes.extend(self.token.0);

    for opt in opts(&self.opts) {
      opt.extend_bytes(&mut bytes);
    }

    if !self.payload.0.is_empty() {
      bytes.push(0b11111111);
      bytes.extend(self.payload.0);
    }

    Ok(bytes)
  }
}

pub(crate) fn opt_len_or_delta(val: u16) -> (u8, Option<ArrayVec<[u8; 2]>>) {
  match val {
    | n if n >= 269 => {
      let mut bytes = ArrayVec::new();
      bytes.extend((n - 269).to_be_bytes());
      (14, Some(bytes))
    },
    | n if n >= 13 => {
      let mut bytes = ArrayVec::new();
      bytes.push((n as u8) - 13);
      (13, Some(bytes))
    },
    | n => (n as u8, None),
  }
}

impl From<Byte1> for u8 {
  fn from(b: Byte1) -> u8 {
    let ver = b.ver.0 << 6;
    let ty = u8::from(b.ty) << 4;
    let tkl = b.tkl;

    ver | ty | tkl
  }
}
