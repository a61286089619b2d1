use embedded_time::duration::Milliseconds;

use crate::retry::RetryPolicy;
use crate::time::Millis;

/// Number of times the orchestrator polls the transport for a reply
/// (and separately, retries sending a follow-up block request)
/// before giving up.
pub const MAX_NO_DATA_RETRIES: u16 = 20;

/// How long the orchestrator sleeps between two polls that yielded no data
pub const WAIT_FOR_RESPONSE: Millis = Milliseconds(200);

/// Number of times the codec resends an unacknowledged confirmable request
pub const MAX_RESENDING_COUNT: u16 = 3;

/// Interval between two retransmissions of the same confirmable request
pub const RESENDING_INTERVAL: Millis = Milliseconds(2_000);

/// Receive buffer size used when the transport cannot report an MTU
pub const DEFAULT_MTU: usize = 1472;

/// Buffer size for the textual form of an IPv4 address, including a terminator.
///
/// Every dotted quad fits, so resolved IPv4 addresses are never rejected for length.
pub const MAX_IP_ADDRESS_LENGTH: usize = 16;

/// Whether the last accepted message ID is remembered between exchanges
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Dedup {
  /// A reply to a new exchange is discarded if it carries the
  /// same message ID as the last reply accepted by a previous exchange.
  AcrossExchanges,
  /// Duplicate detection starts over with every exchange.
  PerExchange,
}

/// Runtime config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
  /// Budget for polling the transport when no data is available.
  ///
  /// Defaults to [`MAX_NO_DATA_RETRIES`] polls, [`WAIT_FOR_RESPONSE`] apart:
  /// ```
  /// use embedded_time::duration::Milliseconds;
  /// use kta::config::Config;
  /// use kta::retry::RetryPolicy;
  ///
  /// assert_eq!(Config::default().poll,
  ///            RetryPolicy::fixed(20, Milliseconds(200)));
  /// ```
  pub poll: RetryPolicy,

  /// Budget for re-sending a follow-up Block2 request
  /// when sending it fails.
  ///
  /// Defaults to the same budget as [`Config::poll`]:
  /// ```
  /// use embedded_time::duration::Milliseconds;
  /// use kta::config::Config;
  /// use kta::retry::RetryPolicy;
  ///
  /// assert_eq!(Config::default().block_request,
  ///            RetryPolicy::fixed(20, Milliseconds(200)));
  /// ```
  pub block_request: RetryPolicy,

  /// Retransmission of confirmable requests, performed by the codec
  /// while the orchestrator is waiting for data.
  ///
  /// Defaults to [`MAX_RESENDING_COUNT`] resends, [`RESENDING_INTERVAL`] apart:
  /// ```
  /// use embedded_time::duration::Milliseconds;
  /// use kta::config::Config;
  /// use kta::retry::RetryPolicy;
  ///
  /// assert_eq!(Config::default().retransmit,
  ///            RetryPolicy::fixed(3, Milliseconds(2_000)));
  /// ```
  pub retransmit: RetryPolicy,

  /// Size of the receive buffer when the transport
  /// cannot tell us its MTU.
  ///
  /// ```
  /// use kta::config::Config;
  ///
  /// assert_eq!(Config::default().default_mtu, 1472);
  /// ```
  pub default_mtu: usize,

  /// Longest a single receive is allowed to block for.
  ///
  /// Only meaningful to transports that can wait (e.g. [`crate::std::UdpTransport`]);
  /// ```
  /// use embedded_time::duration::Milliseconds;
  /// use kta::config::Config;
  ///
  /// assert_eq!(Config::default().recv_timeout, Milliseconds(10u64));
  /// ```
  pub recv_timeout: Millis,

  /// Number of random bytes in each request token.
  ///
  /// ```
  /// use kta::config::Config;
  ///
  /// assert_eq!(Config::default().token_len, 4);
  /// ```
  pub token_len: usize,

  /// See [`Dedup`]
  ///
  /// ```
  /// use kta::config::{Config, Dedup};
  ///
  /// assert_eq!(Config::default().dedup, Dedup::AcrossExchanges);
  /// ```
  pub dedup: Dedup,
}

impl Default for Config {
  fn default() -> Self {
    Config { poll: RetryPolicy::fixed(MAX_NO_DATA_RETRIES, WAIT_FOR_RESPONSE),
             block_request: RetryPolicy::fixed(MAX_NO_DATA_RETRIES, WAIT_FOR_RESPONSE),
             retransmit: RetryPolicy::fixed(MAX_RESENDING_COUNT, RESENDING_INTERVAL),
             default_mtu: DEFAULT_MTU,
             recv_timeout: Milliseconds(10),
             token_len: core::mem::size_of::<u32>(),
             dedup: Dedup::AcrossExchanges }
  }
}

impl Config {
  /// Longest an exchange can block waiting on a silent server,
  /// not counting block-wise continuations.
  ///
  /// ```
  /// use embedded_time::duration::Milliseconds;
  /// use kta::config::Config;
  ///
  /// assert_eq!(Config::default().max_silence(), Milliseconds(4_000u64));
  /// ```
  pub fn max_silence(&self) -> Millis {
    self.poll.max_time()
  }
}
