use kta::config::Config;
use kta::net::IpVersion;
use kta::platform::Platform;
use kta::ExchangeContext;

/// Send one request to a CoAP provisioning server and print the response.
///
/// ```text
/// RUST_LOG=debug cargo run --example client -- 192.0.2.10 5683 provisioning/v1 hello
/// ```
fn main() {
  simple_logger::init_with_env().unwrap();

  let args = std::env::args().skip(1).collect::<Vec<_>>();
  let (host, port, path, payload) = match args.as_slice() {
    | [host, port, path, payload] => (host, port.parse::<u16>().unwrap(), path, payload),
    | _ => {
      eprintln!("usage: client <host> <port> <uri path> <payload>");
      std::process::exit(2);
    },
  };

  let ip_version = match host.parse::<std::net::IpAddr>() {
    | Ok(std::net::IpAddr::V6(_)) => IpVersion::V6,
    | _ => IpVersion::V4,
  };

  let config = Config::default();
  let mut kta = ExchangeContext::connect(Platform::std(&config),
                                         config,
                                         ip_version,
                                         path,
                                         host,
                                         port).unwrap();

  match kta.exchange(payload.as_bytes(), 64 * 1024) {
    | Ok(rep) => println!("{}", String::from_utf8_lossy(&rep)),
    | Err(e) => log::error!("exchange failed: {}", e),
  }

  kta.terminate().unwrap();
}
