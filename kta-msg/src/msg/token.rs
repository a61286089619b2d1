use tinyvec::ArrayVec;

/// # Token
/// A 0-8 byte value used to correlate requests and responses.
///
/// The [`crate::Id`] of a message identifies the datagram (and detects
/// duplicates of it), while the Token identifies the exchange:
/// a response carried in a separate message has a new Id
/// but echoes the Token of the request.
///
/// See [RFC7252 - Token](https://datatracker.ietf.org/doc/html/rfc7252#section-5.3.1)
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Hash, Debug)]
pub struct Token(pub ArrayVec<[u8; 8]>);

impl Token {
  /// Copy up to the first 8 bytes of a slice into a Token
  ///
  /// ```
  /// use kta_msg::Token;
  ///
  /// assert_eq!(Token::from_slice(&[1, 2]).0.as_slice(), &[1, 2]);
  /// assert_eq!(Token::from_slice(&[0; 12]).0.len(), 8);
  /// ```
  pub fn from_slice(bytes: &[u8]) -> Self {
    Token(bytes.iter().copied().take(8).collect())
  }

  /// Token length in bytes
  pub fn len(&self) -> usize {
    self.0.len()
  }

  /// Whether the token is empty
  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }
}
