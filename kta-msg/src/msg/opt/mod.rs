use crate::from_bytes::TryConsumeBytes;
use crate::{Cursor, OptionMap};

/// Errors encounterable while parsing an option from bytes
pub mod parse_error;
pub use parse_error::*;

/// Well-known option numbers & values
pub mod known;
pub use known::*;

pub(crate) fn parse_opt_len_or_delta<A: AsRef<[u8]>>(head: u8,
                                                     bytes: &mut Cursor<A>,
                                                     reserved_err: OptParseError)
                                                     -> Result<u16, OptParseError> {
  match head {
    | 13 => {
      let n = bytes.next().ok_or_else(OptParseError::eof)?;
      Ok((n as u16) + 13)
    },
    | 14 => match bytes.take_exact(2) {
      | Some(&[a, b]) => u16::from_be_bytes([a, b]).checked_add(269)
                                                   .ok_or(OptParseError::OptionNumberOverflow),
      | _ => Err(OptParseError::eof()),
    },
    | 15 => Err(reserved_err),
    | _ => Ok(head as u16),
  }
}

/// # `Opt` struct
/// Low-level representation of a CoAP Option as it appears on the wire.
///
/// This does not store the Option Number; only the difference between it
/// and the number of the option before it. [`OptionMap`] is the structure
/// messages actually hold, and it is converted to and from a sequence of
/// `Opt`s when serializing and parsing.
///
/// See [RFC7252 - Option Format](https://datatracker.ietf.org/doc/html/rfc7252#section-3.1)
#[derive(Clone, PartialEq, Eq, PartialOrd, Debug, Default)]
pub struct Opt {
  /// See [`OptDelta`]
  pub delta: OptDelta,
  /// See [`OptValue`]
  pub value: OptValue,
}

impl Opt {
  /// Size of this option on the wire
  pub fn get_size(&self) -> usize {
    let header_size = 1;
    let delta_size = match self.delta.0 {
      | n if n >= 269 => 2,
      | n if n >= 13 => 1,
      | _ => 0,
    };

    let value_len_size = match self.value.0.len() {
      | n if n >= 269 => 2,
      | n if n >= 13 => 1,
      | _ => 0,
    };

    header_size + delta_size + value_len_size + self.value.0.len()
  }

  /// Given a collection to [`Extend`] and an Opt, add that Opt's bytes to the collection.
  pub fn extend_bytes(&self, bytes: &mut impl Extend<u8>) {
    let (del, del_bytes) = crate::to_bytes::opt_len_or_delta(self.delta.0);
    let (len, len_bytes) = crate::to_bytes::opt_len_or_delta(self.value.0.len() as u16);
    let del = del << 4;

    let header = del | len;

    bytes.extend(Some(header));

    if let Some(bs) = del_bytes {
      bytes.extend(bs);
    }

    if let Some(bs) = len_bytes {
      bytes.extend(bs);
    }

    bytes.extend(self.value.0.iter().copied());
  }
}

/// The "Option Delta" is the difference between this Option's Number
/// and the previous Option's number.
///
/// # Related
/// - [RFC7252#section-3.1 Option Format](https://datatracker.ietf.org/doc/html/rfc7252#section-3.1)
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Debug, Default)]
pub struct OptDelta(pub u16);

/// # Option Number
/// Identifies which option is being set (e.g. Content-Format has a Number of 12).
///
/// See [`known`] for the numbers this crate gives names to, and
/// [RFC7252 - Option Numbers](https://datatracker.ietf.org/doc/html/rfc7252#section-12.2).
#[derive(Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Default)]
pub struct OptNumber(pub u32);

impl OptNumber {
  /// Whether a server that does not recognize this option must reject the message
  /// (the option is "critical")
  ///
  /// ```
  /// use kta_msg::known::no_repeat::{BLOCK2, SIZE2};
  ///
  /// assert!(BLOCK2.is_critical());
  /// assert!(!SIZE2.is_critical());
  /// ```
  pub fn is_critical(&self) -> bool {
    self.0 & 0b1 == 1
  }
}

/// Value of an option; a string, uint, or opaque bytes depending on the option.
#[derive(Clone, Hash, PartialEq, Eq, PartialOrd, Debug, Default)]
pub struct OptValue(pub Vec<u8>);

impl OptValue {
  /// Encode an unsigned integer using the fewest bytes possible;
  /// zero is encoded as an empty value.
  ///
  /// ```
  /// use kta_msg::OptValue;
  ///
  /// assert_eq!(OptValue::uint(0), OptValue(vec![]));
  /// assert_eq!(OptValue::uint(42), OptValue(vec![42]));
  /// assert_eq!(OptValue::uint(0x0102), OptValue(vec![1, 2]));
  /// ```
  pub fn uint(n: u32) -> Self {
    let bytes = n.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    OptValue(bytes[skip..].to_vec())
  }

  /// Decode this value as an unsigned integer, yielding None if it is longer than 4 bytes.
  pub fn as_uint(&self) -> Option<u32> {
    if self.0.len() > 4 {
      return None;
    }

    Some(self.0
             .iter()
             .fold(0u32, |n, b| (n << 8) | u32::from(*b)))
  }
}

impl<Bytes: AsRef<[u8]>> TryConsumeBytes<Bytes> for OptionMap {
  type Error = OptParseError;

  fn try_consume_bytes(bytes: &mut Cursor<Bytes>) -> Result<Self, Self::Error> {
    let mut opts = OptionMap::new();
    let mut number = 0u32;

    loop {
      match Opt::try_consume_bytes(bytes) {
        | Ok(opt) => {
          number += u32::from(opt.delta.0);
          opts.entry(OptNumber(number)).or_default().push(opt.value);
        },
        | Err(OptParseError::OptionsExhausted) => break Ok(opts),
        | Err(e) => break Err(e),
      }
    }
  }
}

impl<Bytes: AsRef<[u8]>> TryConsumeBytes<Bytes> for Opt {
  type Error = OptParseError;

  fn try_consume_bytes(bytes: &mut Cursor<Bytes>) -> Result<Self, Self::Error> {
    // leave the payload marker for the message to consume
    let byte1 = match bytes.peek_exact(1) {
      | None | Some(&[0b11111111]) => return Err(OptParseError::OptionsExhausted),
      | Some(_) => bytes.next().ok_or_else(OptParseError::eof)?,
    };

    // delta must be consumed before length; their extended bytes appear in that order
    let delta = parse_opt_len_or_delta(byte1 >> 4,
                                       bytes,
                                       OptParseError::OptionDeltaReservedValue(15))?;
    let delta = OptDelta(delta);

    let len = parse_opt_len_or_delta(byte1 & 0b00001111,
                                     bytes,
                                     OptParseError::ValueLengthReservedValue(15))?
              as usize;

    let value = bytes.take_exact(len).ok_or_else(OptParseError::eof)?;
    let value = OptValue(value.to_vec());

    Ok(Opt { delta, value })
  }
}
