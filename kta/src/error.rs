use std::collections::TryReserveError;

use kta_msg::{MessageParseError, MessageToBytesError};

/// The context that an error occurred in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum When {
  /// We were resolving the host, opening a socket or allocating buffers
  Initializing,
  /// We were building or sending the request
  Sending,
  /// We were polling for (or classifying) a reply
  Polling,
  /// We were requesting this Block2 block number
  RequestingBlock(u32),
  /// Not tied to a specific phase
  None,
}

impl When {
  /// Construct a specific error from the context the error occurred in
  pub fn what<E>(self, what: What<E>) -> Error<E> {
    Error { when: self, what }
  }
}

/// A detailed error from within the exchange engine.
///
/// `E` is the error type of the [`crate::net::Transport`] in use.
///
/// Callers of [`crate::exchange::ExchangeContext`] never see this directly;
/// it is logged and then mapped to the coarse public [`crate::Error`].
#[derive(Debug)]
pub struct Error<E> {
  /// What happened?
  pub what: What<E>,
  /// What were we doing when it happened?
  pub when: When,
}

/// A contextless error with some additional debug data attached.
#[derive(Debug)]
pub enum What<E> {
  /// An argument was missing or invalid, or the context was in the wrong state
  Parameter(&'static str),
  /// Hostname resolution failed or yielded an unusable address
  Resolve(Option<E>),
  /// Creating the socket failed
  Socket(E),
  /// Sending a datagram failed
  Send(E),
  /// Receiving a datagram failed for a reason other than "no network"
  Recv(E),
  /// The transport reports no network connectivity
  NoNetwork(E),
  /// Parsing a message from bytes failed
  FromBytes(MessageParseError),
  /// Serializing a message to bytes failed
  ToBytes(MessageToBytesError),
  /// A buffer could not be allocated
  Memory(TryReserveError),
  /// The entropy source failed
  Entropy(rand::Error),
  /// The clock failed to provide timing.
  ///
  /// See [`embedded_time::clock::Error`]
  Clock(embedded_time::clock::Error),
  /// The polling budget ran out without a reply
  RetriesExhausted,
  /// The codec classified a reply as something we cannot act on
  Unrecognized(&'static str),
}

/// # Public error codes
///
/// The deliberately coarse set of errors callers of the
/// exchange engine need to act on. `Ok` is represented by [`Result::Ok`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PublicError {
  /// Bad or missing arguments, or the engine was used in the wrong
  /// lifecycle state (exchange before init, init twice)
  Parameter,
  /// A reply was malformed or unexpected, or a request could not be built
  Data,
  /// No network connectivity at the transport layer
  Network,
  /// A buffer could not be allocated
  Memory,
  /// The server stayed silent for the entire retry budget
  Timeout,
}

impl core::fmt::Display for PublicError {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    let s = match self {
      | Self::Parameter => "invalid parameter or state",
      | Self::Data => "malformed or unexpected data",
      | Self::Network => "no network",
      | Self::Memory => "out of memory",
      | Self::Timeout => "retries exhausted waiting for a reply",
    };

    f.write_str(s)
  }
}

impl std::error::Error for PublicError {}

impl<'a, E> From<&'a What<E>> for PublicError {
  fn from(what: &'a What<E>) -> Self {
    match what {
      | What::Parameter(_) | What::Resolve(_) => PublicError::Parameter,
      | What::NoNetwork(_) | What::Socket(_) => PublicError::Network,
      | What::Memory(_) => PublicError::Memory,
      | What::RetriesExhausted => PublicError::Timeout,
      | What::Send(_)
      | What::Recv(_)
      | What::FromBytes(_)
      | What::ToBytes(_)
      | What::Entropy(_)
      | What::Clock(_)
      | What::Unrecognized(_) => PublicError::Data,
    }
  }
}

impl<E: core::fmt::Debug> Error<E> {
  /// Log this error and collapse it into a [`PublicError`]
  pub fn publish(self) -> PublicError {
    let public = PublicError::from(&self.what);
    log::error!("{:?} while {:?} ({})", self.what, self.when, public);
    public
  }
}

impl<E> From<TryReserveError> for What<E> {
  fn from(e: TryReserveError) -> Self {
    What::Memory(e)
  }
}

impl<E> From<MessageParseError> for What<E> {
  fn from(e: MessageParseError) -> Self {
    What::FromBytes(e)
  }
}

impl<E> From<MessageToBytesError> for What<E> {
  fn from(e: MessageToBytesError) -> Self {
    What::ToBytes(e)
  }
}

impl<E> From<embedded_time::clock::Error> for What<E> {
  fn from(e: embedded_time::clock::Error) -> Self {
    What::Clock(e)
  }
}

impl<E> From<rand::Error> for What<E> {
  fn from(e: rand::Error) -> Self {
    What::Entropy(e)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mapper_is_total_and_coarse() {
    type W = What<()>;

    assert_eq!(PublicError::from(&W::Parameter("x")), PublicError::Parameter);
    assert_eq!(PublicError::from(&W::Resolve(None)), PublicError::Parameter);
    assert_eq!(PublicError::from(&W::NoNetwork(())), PublicError::Network);
    assert_eq!(PublicError::from(&W::Recv(())), PublicError::Data);
    assert_eq!(PublicError::from(&W::FromBytes(MessageParseError::eof())),
               PublicError::Data);
    assert_eq!(PublicError::from(&W::Unrecognized("reset")), PublicError::Data);
    assert_eq!(PublicError::from(&W::RetriesExhausted), PublicError::Timeout);

    let oom = Vec::<u8>::new().try_reserve_exact(usize::MAX).unwrap_err();
    assert_eq!(PublicError::from(&W::Memory(oom)), PublicError::Memory);
  }

  #[test]
  fn publish_keeps_mapping() {
    let e = When::Polling.what(What::<()>::RetriesExhausted);
    assert_eq!(e.publish(), PublicError::Timeout);
  }
}
