use kta_msg::{Block, Code, ContentFormat, Id, Message, Payload, Token, Type};
use tinyvec::ArrayVec;

use crate::entropy::Entropy;
use crate::error::What;

/// Errors encounterable while using ReqBuilder
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
  /// Tokens may be at most 8 bytes
  TokenTooLong(usize),
}

/// Build a request
///
/// The message ID is left as `Id(0)`; the codec assigns
/// the real one when the request is sent.
///
/// ```
/// use kta::builder::ReqBuilder;
/// use kta_msg::{Code, ContentFormat, Token};
///
/// let req = ReqBuilder::post("provisioning/v1").token(&[1, 2, 3, 4])
///                                             .content_format(ContentFormat::OctetStream)
///                                             .payload(b"ping")
///                                             .build()
///                                             .unwrap();
///
/// assert_eq!(req.code, Code::POST);
/// assert_eq!(req.token, Token::from_slice(&[1, 2, 3, 4]));
/// assert_eq!(req.path(), vec!["provisioning", "v1"]);
/// assert_eq!(req.payload(), b"ping");
/// ```
#[derive(Clone, Debug)]
pub struct ReqBuilder {
  inner: Result<Message, Error>,
}

impl ReqBuilder {
  fn new(code: Code, path: &str) -> Self {
    let mut msg = Message::new(Type::Con, code, Id(0), Token::default());
    msg.set_path(path);
    Self { inner: Ok(msg) }
  }

  /// Creates a confirmable POST request
  pub fn post(path: &str) -> Self {
    Self::new(Code::POST, path)
  }

  /// Set the token of the request
  ///
  /// # Errors
  /// Causes the builder to error if the token is longer than 8 bytes.
  pub fn token(mut self, token: &[u8]) -> Self {
    if token.len() > 8 {
      self.inner = Err(Error::TokenTooLong(token.len()));
    } else if let Ok(msg) = self.inner.as_mut() {
      msg.token = Token::from_slice(token);
    }

    self
  }

  /// Set the Content-Format of the request
  pub fn content_format(mut self, f: ContentFormat) -> Self {
    if let Ok(msg) = self.inner.as_mut() {
      msg.set_content_format(f);
    }

    self
  }

  /// Ask the server for a specific block of the response body
  pub fn block2(mut self, b: Block) -> Self {
    if let Ok(msg) = self.inner.as_mut() {
      msg.set_block2(b);
    }

    self
  }

  /// Set the payload of the request
  pub fn payload(mut self, bytes: &[u8]) -> Self {
    if let Ok(msg) = self.inner.as_mut() {
      msg.payload = Payload(bytes.to_vec());
    }

    self
  }

  /// Unwrap the builder into the built request
  pub fn build(self) -> Result<Message, Error> {
    self.inner
  }
}

/// Build the request every exchange starts with:
/// a POST of `payload` to `path` as an octet stream, with a fresh random token.
pub fn request<R: Entropy, E>(entropy: &mut R,
                              token_len: usize,
                              path: &str,
                              payload: &[u8])
                              -> Result<Message, What<E>> {
  let token = random_token(entropy, token_len)?;

  ReqBuilder::post(path).token(&token)
                        .content_format(ContentFormat::OctetStream)
                        .payload(payload)
                        .build()
                        .map_err(|_| What::Parameter("token_len"))
}

/// Build a request for the block following `prev`.
///
/// The block number is advanced and the size exponent kept,
/// so the server keeps using the block size it chose.
pub fn block2_request<R: Entropy, E>(entropy: &mut R,
                                     token_len: usize,
                                     path: &str,
                                     prev: Block)
                                     -> Result<Message, What<E>> {
  let token = random_token(entropy, token_len)?;

  ReqBuilder::post(path).token(&token)
                        .content_format(ContentFormat::OctetStream)
                        .block2(prev.next())
                        .build()
                        .map_err(|_| What::Parameter("token_len"))
}

fn random_token<R: Entropy, E>(entropy: &mut R,
                               token_len: usize)
                               -> Result<ArrayVec<[u8; 8]>, What<E>> {
  if token_len > 8 {
    return Err(What::Parameter("token_len"));
  }

  let mut token = ArrayVec::from_array_len([0u8; 8], token_len);
  entropy.random_bytes(&mut token)?;
  Ok(token)
}

#[cfg(test)]
mod tests {
  use kta_msg::known::no_repeat;
  use kta_msg::OptValue;
  use rand::SeedableRng;

  use super::*;

  fn rng() -> rand_chacha::ChaCha8Rng {
    rand_chacha::ChaCha8Rng::seed_from_u64(0)
  }

  #[test]
  fn default_request_header() {
    let req = request::<_, ()>(&mut rng(), 4, "/kta/v1", b"ping").unwrap();

    assert_eq!(req.ty, Type::Con);
    assert_eq!(req.code, Code::POST);
    assert_eq!(req.id, Id(0));
    assert_eq!(req.token.len(), 4);
    assert_eq!(req.content_format(), Some(ContentFormat::OctetStream));
    assert_eq!(req.path(), vec!["kta", "v1"]);
    assert_eq!(req.payload(), b"ping");
    assert_eq!(req.block2(), None);
  }

  #[test]
  fn tokens_are_fresh() {
    let mut rng = rng();
    let a = request::<_, ()>(&mut rng, 4, "a", b"x").unwrap();
    let b = request::<_, ()>(&mut rng, 4, "a", b"x").unwrap();
    assert_ne!(a.token, b.token);
  }

  #[test]
  fn block2_request_advances_block() {
    let prev = Block::new(1024, 0, true);
    let req = block2_request::<_, ()>(&mut rng(), 4, "a", prev).unwrap();

    assert_eq!(req.block2(), Some(Block::new(1024, 1, false)));
    assert_eq!(req.get_first(no_repeat::BLOCK2), Some(&OptValue(vec![0b0001_0110])));
    assert!(req.payload().is_empty());
  }

  #[test]
  fn token_too_long() {
    assert_eq!(ReqBuilder::post("a").token(&[0; 9]).build().unwrap_err(),
               Error::TokenTooLong(9));
    assert!(matches!(request::<_, ()>(&mut rng(), 9, "a", b"x"),
                     Err(What::Parameter(_))));
  }
}
