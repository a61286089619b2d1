use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};

use embedded_time::rate::Fraction;
use rand::SeedableRng;

use crate::config::Config;
use crate::net::{Addrd, IpVersion, Transport, TransportError};
use crate::platform::{Alloc, Platform};
use crate::time::Millis;

/// Collaborators for platforms that support `std`
pub type Std = Alloc<UdpTransport, rand_chacha::ChaCha8Rng, Clock>;

impl Platform<Std> {
  /// Create the std platform: UDP sockets from `std::net`,
  /// an OS-seeded ChaCha generator, and a monotonic clock.
  pub fn std(config: &Config) -> Self {
    Platform::new(UdpTransport::new(config),
                  rand_chacha::ChaCha8Rng::from_entropy(),
                  Clock::new())
  }
}

pub(crate) fn io_to_nb(err: io::Error) -> nb::Error<io::Error> {
  match err.kind() {
    | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => nb::Error::WouldBlock,
    | _ => nb::Error::Other(err),
  }
}

impl TransportError for io::Error {
  fn no_network(&self) -> bool {
    matches!(self.kind(),
             io::ErrorKind::NotConnected
             | io::ErrorKind::AddrNotAvailable
             | io::ErrorKind::NetworkDown
             | io::ErrorKind::NetworkUnreachable
             | io::ErrorKind::HostUnreachable)
  }
}

/// [`Transport`] over [`std::net::UdpSocket`]
#[derive(Debug, Clone, Copy)]
pub struct UdpTransport {
  recv_timeout: Millis,
  mtu: usize,
}

impl UdpTransport {
  /// Create a transport whose receives block for at most
  /// [`Config::recv_timeout`], and whose MTU is [`Config::default_mtu`]
  pub fn new(config: &Config) -> Self {
    Self { recv_timeout: config.recv_timeout,
           mtu: config.default_mtu }
  }
}

impl Transport for UdpTransport {
  type Error = io::Error;
  type Socket = UdpSocket;

  fn resolve(&self, host: &str, version: IpVersion) -> io::Result<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
      return Ok(ip);
    }

    (host, 0).to_socket_addrs()?
             .map(|addr| addr.ip())
             .find(|ip| version.matches(ip))
             .ok_or_else(|| {
               io::Error::new(io::ErrorKind::NotFound,
                              format!("{} has no {:?} address", host, version))
             })
  }

  fn create_socket(&self, version: IpVersion) -> io::Result<UdpSocket> {
    let any = match version {
      | IpVersion::V4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
      | IpVersion::V6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    };

    let sock = UdpSocket::bind(SocketAddr::new(any, 0))?;

    match self.recv_timeout.0 {
      | 0 => sock.set_nonblocking(true)?,
      | ms => sock.set_read_timeout(Some(std::time::Duration::from_millis(ms)))?,
    }

    Ok(sock)
  }

  fn send_to(&self, sock: &mut UdpSocket, dgram: Addrd<&[u8]>) -> nb::Result<(), io::Error> {
    sock.send_to(dgram.data(), dgram.addr())
        .map(|_| ())
        .map_err(io_to_nb)
  }

  fn recv_from(&self, sock: &mut UdpSocket, buf: &mut [u8]) -> nb::Result<Addrd<usize>, io::Error> {
    sock.recv_from(buf)
        .map(|(n, addr)| Addrd(n, addr))
        .map_err(io_to_nb)
  }

  fn mtu(&self) -> io::Result<usize> {
    Ok(self.mtu)
  }

  fn dispose(&self, sock: UdpSocket) {
    drop(sock);
  }
}

/// Implement [`embedded_time::Clock`] using [`std::time`] primitives
#[derive(Debug, Clone, Copy)]
pub struct Clock(std::time::Instant);

impl Default for Clock {
  fn default() -> Self {
    Self::new()
  }
}

impl Clock {
  /// Create a new clock
  pub fn new() -> Self {
    Self(std::time::Instant::now())
  }
}

impl embedded_time::Clock for Clock {
  type T = u64;

  // milliseconds
  const SCALING_FACTOR: Fraction = Fraction::new(1, 1_000);

  fn try_now(&self) -> Result<embedded_time::Instant<Self>, embedded_time::clock::Error> {
    let elapsed = std::time::Instant::now().duration_since(self.0);
    Ok(embedded_time::Instant::new(elapsed.as_millis() as u64))
  }
}

impl crate::time::Clock for Clock {
  fn sleep(&self, dur: Millis) {
    std::thread::sleep(std::time::Duration::from_millis(dur.0));
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::time;

  #[test]
  fn numeric_hosts_skip_dns() {
    let transport = UdpTransport::new(&Config::default());

    assert_eq!(transport.resolve("10.0.0.7", IpVersion::V4).unwrap(),
               IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)));
    assert_eq!(transport.resolve("::1", IpVersion::V6).unwrap(),
               IpAddr::V6(Ipv6Addr::LOCALHOST));
  }

  #[test]
  fn no_data_is_would_block() {
    let transport = UdpTransport::new(&Config::default());
    let mut sock = transport.create_socket(IpVersion::V4).unwrap();
    let mut buf = [0u8; 16];

    assert!(matches!(transport.recv_from(&mut sock, &mut buf),
                     Err(nb::Error::WouldBlock)));
    transport.dispose(sock);
  }

  #[test]
  fn unreachable_network_is_no_network() {
    for kind in [io::ErrorKind::NetworkDown,
                 io::ErrorKind::NetworkUnreachable,
                 io::ErrorKind::HostUnreachable,
                 io::ErrorKind::NotConnected]
    {
      assert!(io::Error::from(kind).no_network(), "{:?}", kind);
    }

    assert!(!io::Error::from(io::ErrorKind::ConnectionRefused).no_network());
  }

  #[test]
  #[cfg(target_os = "linux")]
  fn os_errors_are_no_network() {
    // ENETDOWN, ENETUNREACH, EHOSTUNREACH
    for code in [100, 101, 113] {
      let err = io::Error::from_raw_os_error(code);
      assert!(err.no_network(), "{:?}", err.kind());
    }
  }

  #[test]
  fn loopback_datagram() {
    let transport = UdpTransport::new(&Config::default());
    let mut a = transport.create_socket(IpVersion::V4).unwrap();
    let mut b = transport.create_socket(IpVersion::V4).unwrap();
    let b_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST),
                                 b.local_addr().unwrap().port());

    transport.send_to(&mut a, Addrd(b"hi".as_slice(), b_addr)).unwrap();

    let mut buf = [0u8; 16];
    let n = nb::block!(transport.recv_from(&mut b, &mut buf)).unwrap();
    assert_eq!(&buf[..*n.data()], b"hi");
  }

  #[test]
  fn clock_sleeps() {
    let clock = Clock::new();
    let before = time::relative_time(&clock).unwrap();
    crate::time::Clock::sleep(&clock, Millis::new(5));
    let after = time::relative_time(&clock).unwrap();

    assert!(after.0 >= before.0 + 5);
  }
}
