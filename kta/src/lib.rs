//! `kta` is the message exchange engine of a device provisioning agent.
//!
//! It turns "a request payload" into "a response payload or a typed error"
//! by talking CoAP over UDP to one preconfigured server:
//! - POST the payload to the server's uri path as an octet stream
//! - wait out the server's silence (bounded by a polling budget)
//! - retransmit the confirmable request while waiting
//! - discard duplicated & stale replies
//! - follow block-wise responses and reassemble them
//! - collapse everything that can go wrong into a small set of [`Error`]s
//!
//! ## Collaborators
//! The engine does not implement I/O itself; it is handed a
//! [`Platform`](platform::Platform) bundling:
//! - a [`Transport`](net::Transport) (hostname resolution & UDP datagrams)
//! - an [`Entropy`](entropy::Entropy) source (tokens & message IDs)
//! - a [`Clock`](time::Clock) (pacing retries)
//!
//! With the `std` feature, [`Platform::std`](platform::Platform::std)
//! provides all three using `std::net`, `std::time` and an OS-seeded RNG.
//!
//! ## Example
//! ```no_run
//! use kta::config::Config;
//! use kta::exchange::ExchangeContext;
//! use kta::net::IpVersion;
//! use kta::platform::Platform;
//!
//! let config = Config::default();
//! let mut kta = ExchangeContext::connect(Platform::std(&config),
//!                                        config,
//!                                        IpVersion::V4,
//!                                        "provisioning/v1",
//!                                        "192.0.2.10",
//!                                        5683)?;
//!
//! match kta.exchange(b"hello", 4096) {
//!   | Ok(rep) => println!("{} byte response", rep.len()),
//!   | Err(kta::Error::Timeout) => println!("server is not answering"),
//!   | Err(e) => println!("exchange failed: {}", e),
//! }
//! # Ok::<(), kta::Error>(())
//! ```

#![doc(html_root_url = "https://docs.rs/kta/0.4.0")]
#![cfg_attr(any(docsrs, feature = "docs"), feature(doc_cfg))]
// -
// deny
#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![deny(missing_copy_implementations)]
#![cfg_attr(not(test), deny(unsafe_code))]
// -
// warnings
#![cfg_attr(not(test), warn(unreachable_pub))]


pub(crate) mod logging;

/// customizable retrying of fallible operations
pub mod retry;

/// runtime configuration & named constants
pub mod config;

/// time abstractions
pub mod time;

/// network abstractions
pub mod net;

/// random number abstractions
pub mod entropy;

/// platform configuration
pub mod platform;

/// building requests
pub mod builder;

/// # The CoAP handle
///
/// Sits between the exchange engine and the wire format:
/// assigns message IDs, retransmits confirmable requests, drives
/// block-wise transfers and classifies what the server sends back.
pub mod codec;

/// # Exchange orchestrator
///
/// Owns the server connection and drives one exchange at a time
/// through the send / wait for data / classify loop.
pub mod exchange;

/// internal errors & the public error mapper
pub mod error;

/// `std`-only kta stuff
#[cfg(feature = "std")]
#[cfg_attr(docsrs, doc(cfg(feature = "std")))]
pub mod std;

#[doc(inline)]
pub use codec::mtu_to_block_size;
#[doc(inline)]
pub use error::PublicError as Error;
#[doc(inline)]
pub use exchange::ExchangeContext;
