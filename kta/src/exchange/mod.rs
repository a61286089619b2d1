use std::net::SocketAddr;

use embedded_time::Clock as _;
use kta_msg::{Block, Id, Message};

use crate::codec::{mtu_to_block_size, Codec, Status, Tx};
use crate::config::{Config, Dedup};
use crate::error::{PublicError, What, When};
use crate::net::{Addrd, IpVersion, Transport, TransportError as _};
use crate::platform::{self, Platform, PlatformTypes, Socket};
use crate::retry::{Budget, YouShould};
use crate::time::Clock as _;
use crate::{builder, entropy};

mod reassembly;
use reassembly::Reassembly;

/// Where an exchange is at.
///
/// Each call to `Run::step` consumes one state and yields the next.
#[derive(Debug)]
enum State<P: PlatformTypes> {
  /// The request has not been sent yet
  Sending,
  /// Waiting for the server to say something
  AwaitingData,
  /// The server sent this block and there are more;
  /// the following one needs to be requested
  AwaitingBlock2(Block),
  /// The exchange is over
  Done(Result<(), platform::Error<P>>),
}

/// Everything that only exists between `init` and `terminate`
#[derive(Debug)]
struct Connection<P: PlatformTypes> {
  addr: SocketAddr,
  path: String,
  sock: Socket<P>,
  codec: Codec<P::Clock>,
  scratch: Vec<u8>,
}

impl<P: PlatformTypes> Connection<P> {
  /// Borrow the codec along with a way for it to send datagrams
  fn split<'a>(&'a mut self,
               transport: &'a P::Transport)
               -> (&'a mut Codec<P::Clock>, SocketTx<'a, P::Transport>) {
    (&mut self.codec,
     SocketTx { transport,
                sock: &mut self.sock,
                addr: self.addr })
  }
}

#[derive(Debug)]
enum Lifecycle<P: PlatformTypes> {
  Fresh,
  Ready(Connection<P>),
  Terminated,
}

/// Sends the codec's datagrams over the exchange's socket
struct SocketTx<'a, T: Transport> {
  transport: &'a T,
  sock: &'a mut T::Socket,
  addr: SocketAddr,
}

impl<'a, T: Transport> Tx for SocketTx<'a, T> {
  type Error = T::Error;

  fn send(&mut self, dgram: &[u8]) -> Result<(), T::Error> {
    nb::block!(self.transport.send_to(self.sock, Addrd(dgram, self.addr)))
  }
}

/// # CoAP message exchange engine
///
/// Turns a request payload into a response payload (or a [`PublicError`])
/// by POSTing it to one preconfigured server, waiting out the server's silence,
/// deduplicating and following block-wise responses.
///
/// One exchange runs at a time, blocking the calling thread
/// until it completes or its retry budget runs out.
///
/// The socket is released by [`ExchangeContext::terminate`], or when the context is dropped.
///
/// ```no_run
/// use kta::config::Config;
/// use kta::exchange::ExchangeContext;
/// use kta::net::IpVersion;
/// use kta::platform::Platform;
///
/// let config = Config::default();
/// let mut kta = ExchangeContext::connect(Platform::std(&config),
///                                        config,
///                                        IpVersion::V4,
///                                        "provisioning/v1",
///                                        "kta.example.com",
///                                        5683).unwrap();
///
/// let rep = kta.exchange(b"hello", 1024).unwrap();
/// kta.terminate().unwrap();
/// ```
#[derive(Debug)]
pub struct ExchangeContext<P: PlatformTypes> {
  platform: Platform<P>,
  config: Config,
  state: Lifecycle<P>,
  last_id: Option<Id>,
}

impl<P: PlatformTypes> ExchangeContext<P> {
  /// Create an uninitialized context
  pub fn new(platform: Platform<P>, config: Config) -> Self {
    Self { platform,
           config,
           state: Lifecycle::Fresh,
           last_id: None }
  }

  /// Create a context and [`init`](ExchangeContext::init) it
  pub fn connect(platform: Platform<P>,
                 config: Config,
                 ip_version: IpVersion,
                 uri_path: &str,
                 host: &str,
                 port: u16)
                 -> Result<Self, PublicError> {
    let mut ctx = Self::new(platform, config);
    ctx.init(ip_version, uri_path, host, port)?;
    Ok(ctx)
  }

  /// Is the context between `init` and `terminate`?
  pub fn is_initialized(&self) -> bool {
    matches!(self.state, Lifecycle::Ready(_))
  }

  /// Negotiated block size
  pub fn block_size(&self) -> Option<u16> {
    match &self.state {
      | Lifecycle::Ready(conn) => Some(conn.codec.block_size()),
      | _ => None,
    }
  }

  /// Resolve the server, open a socket and negotiate the block size.
  ///
  /// # Errors
  /// - [`PublicError::Parameter`] if an argument is empty or zero,
  ///   the host can't be resolved, or the context is already initialized
  /// - [`PublicError::Network`] if the socket can't be created
  /// - [`PublicError::Memory`] if the receive buffer can't be allocated
  pub fn init(&mut self,
              ip_version: IpVersion,
              uri_path: &str,
              host: &str,
              port: u16)
              -> Result<(), PublicError> {
    let conn = self.connection(ip_version, uri_path, host, port)
                   .map_err(|what| When::Initializing.what(what).publish())?;

    log::info!("initialized: {} {} (block size {})",
               conn.addr,
               conn.path,
               conn.codec.block_size());
    self.state = Lifecycle::Ready(conn);
    Ok(())
  }

  fn connection(&mut self,
                ip_version: IpVersion,
                uri_path: &str,
                host: &str,
                port: u16)
                -> Result<Connection<P>, platform::What<P>> {
    if self.is_initialized() {
      return Err(What::Parameter("already initialized"));
    }

    if uri_path.is_empty() || host.is_empty() || port == 0 {
      return Err(What::Parameter("uri path, host & port are required"));
    }

    let transport = &self.platform.transport;

    let ip = transport.resolve(host, ip_version)
                      .map_err(|e| What::Resolve(Some(e)))?;
    if !ip_version.matches(&ip) {
      return Err(What::Resolve(None));
    }

    let first_id = entropy::random_u16(&mut self.platform.entropy)?;
    let sock = transport.create_socket(ip_version).map_err(What::Socket)?;

    let mtu = transport.mtu().unwrap_or_else(|e| {
                                log::warn!("mtu unavailable ({:?}), using {}",
                                           e,
                                           self.config.default_mtu);
                                self.config.default_mtu
                              });
    let block_size = mtu_to_block_size(u32::try_from(mtu).unwrap_or(u32::MAX));

    let mut scratch = Vec::new();
    if let Err(e) = scratch.try_reserve_exact(mtu) {
      transport.dispose(sock);
      return Err(What::Memory(e));
    }
    scratch.resize(mtu, 0);

    log::debug!("socket {:?} created, mtu {}", sock, mtu);

    Ok(Connection { addr: SocketAddr::new(ip, port),
                    path: uri_path.to_string(),
                    sock,
                    codec: Codec::new(block_size, self.config.retransmit, Id(first_id)),
                    scratch })
  }

  /// POST `request` to the server and wait for the response body,
  /// keeping at most `capacity` bytes of it.
  ///
  /// # Errors
  /// - [`PublicError::Parameter`] if the context isn't initialized, `request` is empty or `capacity` is zero
  /// - [`PublicError::Network`] if the transport reports that there is no network
  /// - [`PublicError::Timeout`] if the server stays silent for the whole polling budget
  /// - [`PublicError::Memory`] if a buffer can't be allocated
  /// - [`PublicError::Data`] for anything else
  pub fn exchange(&mut self, request: &[u8], capacity: usize) -> Result<Vec<u8>, PublicError> {
    if capacity == 0 {
      return Err(Self::reject("capacity must not be zero"));
    }

    self.run(request)?
        .into_vec(capacity)
        .map_err(|e| When::None.what(What::<platform::TransportError<P>>::Memory(e)).publish())
  }

  /// Like [`ExchangeContext::exchange`], writing the response body into `buf`.
  ///
  /// Yields the number of bytes written; the body is truncated to the length of `buf`.
  pub fn exchange_into(&mut self, request: &[u8], buf: &mut [u8]) -> Result<usize, PublicError> {
    if buf.is_empty() {
      return Err(Self::reject("buffer must not be empty"));
    }

    Ok(self.run(request)?.copy_into(buf))
  }

  fn reject(why: &'static str) -> PublicError {
    When::None.what(What::<platform::TransportError<P>>::Parameter(why)).publish()
  }

  fn run(&mut self, request: &[u8]) -> Result<Reassembly, PublicError> {
    if request.is_empty() {
      return Err(Self::reject("request must not be empty"));
    }

    let conn = match &mut self.state {
      | Lifecycle::Ready(conn) => conn,
      | _ => return Err(Self::reject("not initialized")),
    };

    if self.config.dedup == Dedup::PerExchange {
      self.last_id = None;
    }

    let mut run = Run { platform: &mut self.platform,
                        config: &self.config,
                        conn,
                        last_id: &mut self.last_id,
                        request,
                        budget: self.config.poll.budget(),
                        body: Reassembly::default() };

    let mut state = State::Sending;
    let result = loop {
      state = match state {
        | State::Done(result) => break result,
        | state => run.step(state),
      };
    };

    run.conn.codec.clear();
    let body = run.body;

    match result {
      | Ok(()) => {
        log::debug!("exchange done, {} byte response", body.len());
        Ok(body)
      },
      | Err(e) => Err(e.publish()),
    }
  }

  /// Release the socket and forget the server.
  ///
  /// Calling this more than once is harmless; only
  /// the first call after `init` disposes anything.
  ///
  /// # Errors
  /// [`PublicError::Parameter`] if the context was never initialized.
  pub fn terminate(&mut self) -> Result<(), PublicError> {
    match core::mem::replace(&mut self.state, Lifecycle::Terminated) {
      | Lifecycle::Ready(conn) => {
        log::info!("terminating connection to {}", conn.addr);
        self.platform.transport.dispose(conn.sock);
        Ok(())
      },
      | Lifecycle::Terminated => Ok(()),
      | Lifecycle::Fresh => {
        self.state = Lifecycle::Fresh;
        Err(Self::reject("not initialized"))
      },
    }
  }
}

impl<P: PlatformTypes> Drop for ExchangeContext<P> {
  fn drop(&mut self) {
    if self.is_initialized() {
      self.terminate().ok();
    }
  }
}

/// One exchange in progress
struct Run<'a, P: PlatformTypes> {
  platform: &'a mut Platform<P>,
  config: &'a Config,
  conn: &'a mut Connection<P>,
  last_id: &'a mut Option<Id>,
  request: &'a [u8],
  budget: Budget,
  body: Reassembly,
}

impl<'a, P: PlatformTypes> Run<'a, P> {
  fn step(&mut self, state: State<P>) -> State<P> {
    match state {
      | State::Sending => self.send(),
      | State::AwaitingData => self.poll(),
      | State::AwaitingBlock2(block) => self.request_block(block),
      | done @ State::Done(_) => done,
    }
  }

  fn send(&mut self) -> State<P> {
    let sent = builder::request(&mut self.platform.entropy,
                                self.config.token_len,
                                &self.conn.path,
                                self.request).and_then(|req| self.transmit(req));

    match sent {
      | Ok(()) => {
        log::debug!("request sent, awaiting data");
        State::AwaitingData
      },
      | Err(e) => State::Done(Err(When::Sending.what(e))),
    }
  }

  fn transmit(&mut self, req: Message) -> Result<(), platform::What<P>> {
    let now = self.platform.clock.try_now()?;
    let (codec, mut tx) = self.conn.split(&self.platform.transport);
    codec.send(&mut tx, req, now)
  }

  fn poll(&mut self) -> State<P> {
    let recvd = self.platform
                    .transport
                    .recv_from(&mut self.conn.sock, &mut self.conn.scratch);

    match recvd {
      | Ok(Addrd(n, from)) if from == self.conn.addr => self.receive(n),
      | Ok(Addrd(_, from)) => {
        log::debug!("ignoring datagram from {}", from);
        State::AwaitingData
      },
      | Err(nb::Error::Other(e)) if e.no_network() => {
        State::Done(Err(When::Polling.what(What::NoNetwork(e))))
      },
      | Err(nb::Error::Other(e)) => State::Done(Err(When::Polling.what(What::Recv(e)))),
      | Err(nb::Error::WouldBlock) => self.wait(),
    }
  }

  fn wait(&mut self) -> State<P> {
    if self.budget.spend() == YouShould::Cry {
      return State::Done(Err(When::Polling.what(What::RetriesExhausted)));
    }

    log::trace!("no data, {} polls left", self.budget.remaining());

    match self.tick() {
      | Ok(()) => {
        self.platform.clock.sleep(self.config.poll.wait());
        State::AwaitingData
      },
      | Err(e) => State::Done(Err(When::Polling.what(e))),
    }
  }

  fn tick(&mut self) -> Result<(), platform::What<P>> {
    let now = self.platform.clock.try_now()?;
    let (codec, mut tx) = self.conn.split(&self.platform.transport);
    codec.tick(&mut tx, now)
  }

  fn classify(&mut self, msg: &Message) -> Result<Status, platform::What<P>> {
    let now = self.platform.clock.try_now()?;
    let (codec, mut tx) = self.conn.split(&self.platform.transport);
    codec.classify(&mut tx, msg, now)
  }

  fn receive(&mut self, n: usize) -> State<P> {
    let msg = match self.conn.codec.decode(&self.conn.scratch[..n]) {
      | Ok(msg) => msg,
      | Err(e) => return State::Done(Err(When::Polling.what(e.into()))),
    };

    if *self.last_id == Some(msg.id) {
      log::debug!("discarding duplicate message {}", msg.id.0);
      return State::AwaitingData;
    }

    let status = match self.classify(&msg) {
      | Ok(status) => status,
      | Err(e) => return State::Done(Err(When::Polling.what(e))),
    };

    if status == Status::Stale {
      log::debug!("discarding stale message {}", msg.id.0);
      return State::AwaitingData;
    }

    *self.last_id = Some(msg.id);
    self.budget.refill();

    self.classified(status, &msg)
  }

  fn classified(&mut self, status: Status, msg: &Message) -> State<P> {
    match status {
      | Status::Ok(block2) => {
        if let Err(e) = self.body.set_first(msg.payload()) {
          return State::Done(Err(When::Polling.what(What::Memory(e))));
        }

        match block2 {
          | Some(block) if block.more() => State::AwaitingBlock2(block),
          | _ => State::Done(Ok(())),
        }
      },
      | Status::BlockwiseReceived(tail) => {
        self.body.set_tail(tail);
        State::Done(Ok(()))
      },
      | Status::Acked | Status::BlockwiseAck | Status::BlockwiseReceiving | Status::Stale => {
        State::AwaitingData
      },
      | Status::Unrecognized(why) => State::Done(Err(When::Polling.what(What::Unrecognized(why)))),
    }
  }

  fn request_block(&mut self, prev: Block) -> State<P> {
    let when = When::RequestingBlock(prev.num() + 1);
    let mut budget = self.config.block_request.budget();

    loop {
      let sent = builder::block2_request(&mut self.platform.entropy,
                                         self.config.token_len,
                                         &self.conn.path,
                                         prev).and_then(|req| self.transmit(req));

      match sent {
        | Ok(()) => {
          log::debug!("requested block {}", prev.num() + 1);
          self.budget.refill();
          return State::AwaitingData;
        },
        | Err(e) if budget.remaining() == 0 => return State::Done(Err(when.what(e))),
        | Err(e) => {
          budget.spend();
          log::warn!("requesting block {} failed ({:?}), {} attempts left",
                     prev.num() + 1,
                     e,
                     budget.remaining());
          self.platform.clock.sleep(self.config.block_request.wait());
        },
      }
    }
  }
}
