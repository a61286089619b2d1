use std::net::{IpAddr, SocketAddr};

/// Data that came from (or is going to) a network socket
#[derive(PartialEq, PartialOrd, Eq, Ord, Hash, Debug, Clone, Copy)]
pub struct Addrd<T>(pub T, pub SocketAddr);

impl<T> Addrd<T> {
  /// Borrow the contents of this Addressed
  pub fn as_ref(&self) -> Addrd<&T> {
    Addrd(self.data(), self.addr())
  }

  /// Map the data contained in this Addressed
  pub fn map<R>(self, f: impl FnOnce(T) -> R) -> Addrd<R> {
    Addrd(f(self.0), self.1)
  }

  /// Borrow the contents of the addressed item
  pub fn data(&self) -> &T {
    &self.0
  }

  /// Copy the socket address for the data
  pub fn addr(&self) -> SocketAddr {
    self.1
  }
}

/// IP version to resolve hosts & create sockets for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IpVersion {
  /// IPv4
  V4,
  /// IPv6
  V6,
}

impl IpVersion {
  /// Does this address belong to this IP version?
  ///
  /// ```
  /// use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
  ///
  /// use kta::net::IpVersion;
  ///
  /// assert!(IpVersion::V4.matches(&IpAddr::V4(Ipv4Addr::LOCALHOST)));
  /// assert!(!IpVersion::V4.matches(&IpAddr::V6(Ipv6Addr::LOCALHOST)));
  /// ```
  pub fn matches(&self, addr: &IpAddr) -> bool {
    matches!((self, addr),
             (IpVersion::V4, IpAddr::V4(_)) | (IpVersion::V6, IpAddr::V6(_)))
  }
}

/// Errors yielded by a [`Transport`] need to tell
/// the exchange engine whether connectivity is gone
/// (as opposed to some other failure)
pub trait TransportError: core::fmt::Debug {
  /// Is this error caused by the device having no network?
  fn no_network(&self) -> bool;
}

/// The transport collaborator: hostname resolution and UDP datagrams.
///
/// The exchange engine owns exactly one [`Transport::Socket`] at a time,
/// created in `init` and handed back to [`Transport::dispose`] on terminate.
///
/// Sending & receiving are non-blocking in the same way `embedded-nal` sockets are:
/// [`nb::Error::WouldBlock`] from [`Transport::recv_from`] means "no data yet",
/// and is what drives the engine's polling budget.
pub trait Transport {
  /// The error yielded by transport operations
  type Error: TransportError;

  /// An open UDP socket
  type Socket: core::fmt::Debug;

  /// Resolve a hostname (or numeric address) to an IP address of the given version
  fn resolve(&self, host: &str, version: IpVersion) -> Result<IpAddr, Self::Error>;

  /// Create a UDP socket for the given IP version
  fn create_socket(&self, version: IpVersion) -> Result<Self::Socket, Self::Error>;

  /// Send a datagram
  fn send_to(&self, sock: &mut Self::Socket, dgram: Addrd<&[u8]>) -> nb::Result<(), Self::Error>;

  /// Receive a datagram into `buf`, yielding the number of bytes written
  /// and the address of the sender.
  ///
  /// Implementors may block for a short, bounded amount of time
  /// before yielding [`nb::Error::WouldBlock`].
  fn recv_from(&self,
               sock: &mut Self::Socket,
               buf: &mut [u8])
               -> nb::Result<Addrd<usize>, Self::Error>;

  /// Largest datagram the transport can receive
  fn mtu(&self) -> Result<usize, Self::Error>;

  /// Close a socket
  fn dispose(&self, sock: Self::Socket);
}
