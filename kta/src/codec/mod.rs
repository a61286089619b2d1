use embedded_time::Instant;
use kta_msg::{Block, Code, CodeKind, Id, Message, MessageParseError, Payload, Token,
              TryFromBytes, TryIntoBytes, Type};

use crate::error::What;
use crate::logging;
use crate::retry::{RetryPolicy, YouShould};
use crate::time::Clock;

mod block;
mod retransmit;

#[doc(inline)]
pub use block::mtu_to_block_size;
use block::{Inbound, Outbound};
use retransmit::Pending;

/// Where the codec sends the datagrams it produces.
///
/// The exchange engine implements this on top of its socket; the
/// codec never touches the transport directly.
pub trait Tx {
  /// Error yielded when sending fails
  type Error;

  /// Send a datagram to the server
  fn send(&mut self, dgram: &[u8]) -> Result<(), Self::Error>;
}

/// How the codec classified a received message
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
  /// A response to the outstanding request.
  ///
  /// If it carries a Block2 option with `more` set, the
  /// rest of the body has to be requested by the caller.
  Ok(Option<Block>),
  /// The server acknowledged a Block1 block and the codec sent the next one
  BlockwiseAck,
  /// A Block2 block was buffered and the codec requested the next one
  BlockwiseReceiving,
  /// The last Block2 block arrived; this is every block
  /// following the one that started the transfer.
  BlockwiseReceived(Vec<u8>),
  /// An empty ACK; the response will follow separately
  Acked,
  /// Not related to the outstanding request
  Stale,
  /// Something we can't act on
  Unrecognized(&'static str),
}

/// The CoAP handle.
///
/// Owns everything the protocol needs remembered between datagrams:
/// message IDs, the outstanding request, confirmable retransmission
/// and block-wise transfers in both directions.
#[derive(Debug)]
pub struct Codec<C: Clock> {
  block_size: u16,
  next_id: Id,
  retransmit: RetryPolicy,
  last: Option<Message>,
  pending: Option<Pending<C>>,
  outbound: Option<Outbound>,
  inbound: Option<Inbound>,
}

impl<C: Clock> Codec<C> {
  /// Create a codec that splits bodies into `block_size` blocks,
  /// retransmits per `retransmit` and numbers messages starting at `first_id`.
  pub fn new(block_size: u16, retransmit: RetryPolicy, first_id: Id) -> Self {
    Self { block_size,
           next_id: first_id,
           retransmit,
           last: None,
           pending: None,
           outbound: None,
           inbound: None }
  }

  /// Negotiated block size
  pub fn block_size(&self) -> u16 {
    self.block_size
  }

  fn take_id(&mut self) -> Id {
    let id = self.next_id;
    self.next_id = id.next();
    id
  }

  /// Parse a datagram
  pub fn decode(&self, dgram: &[u8]) -> Result<Message, MessageParseError> {
    logging::trace_dgram("rx", dgram);
    let msg = Message::try_from_bytes(dgram)?;
    log::debug!("<- {}", logging::msg_summary(&msg));
    Ok(msg)
  }

  /// Assign a message ID to a request and send it.
  ///
  /// A payload larger than the block size is sent as
  /// the first Block1 block, and the rest is sent as the
  /// server asks for it.
  ///
  /// A request carrying a Block2 option starts (or continues)
  /// collecting the response body.
  pub fn send<T: Tx>(&mut self,
                     tx: &mut T,
                     mut req: Message,
                     now: Instant<C>)
                     -> Result<(), What<T::Error>> {
    if req.payload.0.len() > self.block_size as usize {
      let body = core::mem::take(&mut req.payload.0);
      let size = body.len() as u32;
      let (outbound, block, chunk) = Outbound::start(body, self.block_size);

      req.set_block1(block);
      req.set_size1(size);
      req.payload = Payload(chunk);
      self.outbound = Some(outbound);
    } else {
      self.outbound = None;
    }

    if let Some(block) = req.block2() {
      self.inbound.get_or_insert_with(Inbound::default).expect(block.num());
    }

    self.transmit(tx, req, now)
  }

  fn transmit<T: Tx>(&mut self,
                     tx: &mut T,
                     mut req: Message,
                     now: Instant<C>)
                     -> Result<(), What<T::Error>> {
    req.id = self.take_id();
    log::debug!("-> {}", logging::msg_summary(&req));

    let dgram = req.clone().try_into_bytes()?;
    logging::trace_dgram("tx", &dgram);
    tx.send(&dgram).map_err(What::Send)?;

    self.pending = match req.ty {
      | Type::Con => Some(Pending::new(req.id, dgram, self.retransmit.timer(now))),
      | _ => None,
    };
    self.last = Some(req);

    Ok(())
  }

  fn outstanding_token(&self) -> Option<Token> {
    self.last.as_ref().map(|req| req.token)
  }

  /// Decide what a received message means for the outstanding request,
  /// sending whatever the protocol requires in reaction to it
  /// (ACKs, the next Block1 block, a request for the next Block2 block).
  pub fn classify<T: Tx>(&mut self,
                         tx: &mut T,
                         msg: &Message,
                         now: Instant<C>)
                         -> Result<Status, What<T::Error>> {
    if msg.ty == Type::Reset {
      self.pending = None;
      return Ok(Status::Unrecognized("server reset the exchange"));
    }

    if msg.code == Code::EMPTY {
      return match (msg.ty, self.pending.as_ref().map(Pending::id)) {
        | (Type::Ack, Some(id)) if id == msg.id => {
          self.pending = None;
          Ok(Status::Acked)
        },
        | _ => Ok(Status::Stale),
      };
    }

    if msg.code.kind() != CodeKind::Response || self.outstanding_token() != Some(msg.token) {
      return Ok(Status::Stale);
    }

    if msg.ty == Type::Con {
      let ack = msg.ack().try_into_bytes()?;
      logging::trace_dgram("tx", &ack);
      tx.send(&ack).map_err(What::Send)?;
    }

    if msg.code == Code::CONTINUE {
      return self.continue_block1(tx, msg, now);
    }

    self.outbound = None;

    match self.inbound.take() {
      | Some(inbound) => self.continue_block2(tx, inbound, msg, now),
      | None => {
        self.pending = None;
        Ok(Status::Ok(msg.block2()))
      },
    }
  }

  fn continue_block1<T: Tx>(&mut self,
                            tx: &mut T,
                            msg: &Message,
                            now: Instant<C>)
                            -> Result<Status, What<T::Error>> {
    let (last, outbound) = match (self.last.as_ref(), self.outbound.as_mut()) {
      | (Some(last), Some(outbound)) if outbound.has_more() => (last, outbound),
      | _ => return Ok(Status::Unrecognized("2.31 Continue without a Block1 transfer")),
    };

    self.pending = None;
    let (block, chunk) = outbound.advance(msg.block1());
    let mut req = last.clone();
    req.set_block1(block);
    req.payload = Payload(chunk.to_vec());

    self.transmit(tx, req, now)?;
    Ok(Status::BlockwiseAck)
  }

  fn continue_block2<T: Tx>(&mut self,
                            tx: &mut T,
                            mut inbound: Inbound,
                            msg: &Message,
                            now: Instant<C>)
                            -> Result<Status, What<T::Error>> {
    let block = match msg.block2() {
      | Some(block) => block,
      | None => return Ok(Status::Unrecognized("Block2 continuation without a Block2 option")),
    };

    if !inbound.expects(block) {
      log::debug!("ignoring out of order block {}", block.num());
      self.inbound = Some(inbound);
      return Ok(Status::Stale);
    }

    self.pending = None;
    inbound.append(msg.payload())?;

    if !block.more() {
      return Ok(Status::BlockwiseReceived(inbound.into_tail()));
    }

    let mut req = match self.last.clone() {
      | Some(req) => req,
      | None => return Ok(Status::Unrecognized("Block2 continuation without a request")),
    };
    req.set_block2(block.next());
    req.payload = Payload::default();

    inbound.expect(block.num() + 1);
    self.inbound = Some(inbound);
    self.transmit(tx, req, now)?;

    Ok(Status::BlockwiseReceiving)
  }

  /// Resend the unacknowledged confirmable request, if it's time to.
  pub fn tick<T: Tx>(&mut self, tx: &mut T, now: Instant<C>) -> Result<(), What<T::Error>> {
    let verdict = match self.pending.as_mut() {
      | Some(pending) => pending.poll(tx, now)?,
      | None => return Ok(()),
    };

    if verdict == YouShould::Cry {
      log::warn!("no acknowledgement after {} retransmissions",
                 self.retransmit.max_retries.0);
      self.pending = None;
    }

    Ok(())
  }

  /// Forget all per-exchange protocol state:
  /// block-wise transfers in both directions & pending retransmission.
  ///
  /// Message IDs keep counting.
  pub fn clear(&mut self) {
    self.last = None;
    self.pending = None;
    self.outbound = None;
    self.inbound = None;
  }
}

#[cfg(test)]
mod tests {
  use embedded_time::Clock as _;
  use kta_msg::{ContentFormat, Token};

  use super::*;
  use crate::builder::ReqBuilder;
  use crate::test::{ClockMock, TxMock};
  use crate::time::Millis;

  fn codec(block_size: u16) -> Codec<ClockMock> {
    Codec::new(block_size, RetryPolicy::fixed(3, Millis::new(2_000)), Id(100))
  }

  fn req(payload: &[u8]) -> Message {
    ReqBuilder::post("kta").token(&[1, 2, 3, 4])
                           .content_format(ContentFormat::OctetStream)
                           .payload(payload)
                           .build()
                           .unwrap()
  }

  fn sent(tx: &TxMock, ix: usize) -> Message {
    Message::try_from_bytes(&tx.sent[ix]).unwrap()
  }

  fn piggybacked(req: &Message, payload: &[u8]) -> Message {
    let mut rep = Message::new(Type::Ack, Code::CONTENT, req.id, req.token);
    rep.payload = Payload(payload.to_vec());
    rep
  }

  #[test]
  fn assigns_incrementing_ids() {
    let clock = ClockMock::new();
    let mut codec = Codec::new(1024,
                               RetryPolicy::fixed(3, Millis::new(2_000)),
                               Id(u16::MAX));
    let mut tx = TxMock::default();

    codec.send(&mut tx, req(b"a"), clock.try_now().unwrap()).unwrap();
    codec.send(&mut tx, req(b"b"), clock.try_now().unwrap()).unwrap();

    assert_eq!(sent(&tx, 0).id, Id(u16::MAX));
    assert_eq!(sent(&tx, 1).id, Id(0));
  }

  #[test]
  fn piggybacked_response() {
    let clock = ClockMock::new();
    let mut codec = codec(1024);
    let mut tx = TxMock::default();

    codec.send(&mut tx, req(b"ping"), clock.try_now().unwrap()).unwrap();
    let rep = piggybacked(&sent(&tx, 0), b"hello");

    assert_eq!(codec.classify(&mut tx, &rep, clock.try_now().unwrap()).unwrap(),
               Status::Ok(None));
    assert_eq!(tx.sent.len(), 1);
  }

  #[test]
  fn foreign_token_is_stale() {
    let clock = ClockMock::new();
    let mut codec = codec(1024);
    let mut tx = TxMock::default();

    codec.send(&mut tx, req(b"ping"), clock.try_now().unwrap()).unwrap();
    let mut rep = piggybacked(&sent(&tx, 0), b"hello");
    rep.token = Token::from_slice(&[9, 9]);

    assert_eq!(codec.classify(&mut tx, &rep, clock.try_now().unwrap()).unwrap(),
               Status::Stale);
  }

  #[test]
  fn reset_is_unrecognized() {
    let clock = ClockMock::new();
    let mut codec = codec(1024);
    let mut tx = TxMock::default();

    codec.send(&mut tx, req(b"ping"), clock.try_now().unwrap()).unwrap();
    let rst = Message::new(Type::Reset, Code::EMPTY, sent(&tx, 0).id, Token::default());

    assert!(matches!(codec.classify(&mut tx, &rst, clock.try_now().unwrap()).unwrap(),
                     Status::Unrecognized(_)));
  }

  #[test]
  fn separate_response_is_acked() {
    let clock = ClockMock::new();
    let mut codec = codec(1024);
    let mut tx = TxMock::default();

    codec.send(&mut tx, req(b"ping"), clock.try_now().unwrap()).unwrap();
    let req = sent(&tx, 0);

    let empty_ack = Message::new(Type::Ack, Code::EMPTY, req.id, Token::default());
    assert_eq!(codec.classify(&mut tx, &empty_ack, clock.try_now().unwrap()).unwrap(),
               Status::Acked);

    // acked requests are not retransmitted
    clock.set(10_000);
    codec.tick(&mut tx, clock.try_now().unwrap()).unwrap();
    assert_eq!(tx.sent.len(), 1);

    let mut rep = Message::new(Type::Con, Code::CONTENT, Id(7), req.token);
    rep.payload = Payload(b"hello".to_vec());
    assert_eq!(codec.classify(&mut tx, &rep, clock.try_now().unwrap()).unwrap(),
               Status::Ok(None));

    let ack = sent(&tx, 1);
    assert_eq!(ack.ty, Type::Ack);
    assert_eq!(ack.code, Code::EMPTY);
    assert_eq!(ack.id, Id(7));
  }

  #[test]
  fn retransmits_unacknowledged_request() {
    let clock = ClockMock::new();
    let mut codec = codec(1024);
    let mut tx = TxMock::default();

    codec.send(&mut tx, req(b"ping"), clock.try_now().unwrap()).unwrap();

    for t in [1_999, 2_000, 4_000, 6_000, 8_000, 20_000] {
      clock.set(t);
      codec.tick(&mut tx, clock.try_now().unwrap()).unwrap();
    }

    assert_eq!(tx.sent.len(), 4);
    assert!(tx.sent.iter().all(|d| d == &tx.sent[0]));
  }

  #[test]
  fn block1_request_body() {
    let clock = ClockMock::new();
    let mut codec = codec(16);
    let mut tx = TxMock::default();
    let body = (0..40u8).collect::<Vec<_>>();

    codec.send(&mut tx, req(&body), clock.try_now().unwrap()).unwrap();
    let first = sent(&tx, 0);
    assert_eq!(first.block1(), Some(Block::new(16, 0, true)));
    assert_eq!(first.payload(), &body[..16]);

    let mut cont = Message::new(Type::Ack, Code::CONTINUE, first.id, first.token);
    cont.set_block1(Block::new(16, 0, true));
    assert_eq!(codec.classify(&mut tx, &cont, clock.try_now().unwrap()).unwrap(),
               Status::BlockwiseAck);

    let second = sent(&tx, 1);
    assert_eq!(second.id, first.id.next());
    assert_eq!(second.block1(), Some(Block::new(16, 1, true)));
    assert_eq!(second.payload(), &body[16..32]);

    let cont = Message::new(Type::Ack, Code::CONTINUE, second.id, second.token);
    assert_eq!(codec.classify(&mut tx, &cont, clock.try_now().unwrap()).unwrap(),
               Status::BlockwiseAck);

    let third = sent(&tx, 2);
    assert_eq!(third.block1(), Some(Block::new(16, 2, false)));
    assert_eq!(third.payload(), &body[32..]);

    let rep = piggybacked(&third, b"done");
    assert_eq!(codec.classify(&mut tx, &rep, clock.try_now().unwrap()).unwrap(),
               Status::Ok(None));

    // no more blocks to send
    let cont = Message::new(Type::Ack, Code::CONTINUE, third.id, third.token);
    assert!(matches!(codec.classify(&mut tx, &cont, clock.try_now().unwrap()).unwrap(),
                     Status::Unrecognized(_)));
  }

  #[test]
  fn block2_continuation() {
    let clock = ClockMock::new();
    let mut codec = codec(16);
    let mut tx = TxMock::default();

    codec.send(&mut tx, req(b"ping"), clock.try_now().unwrap()).unwrap();
    let mut rep = piggybacked(&sent(&tx, 0), &[0; 16]);
    rep.set_block2(Block::new(16, 0, true));
    assert_eq!(codec.classify(&mut tx, &rep, clock.try_now().unwrap()).unwrap(),
               Status::Ok(Some(Block::new(16, 0, true))));

    let follow_up = {
      let mut r = req(b"");
      r.set_block2(Block::new(16, 0, true).next());
      r
    };
    codec.send(&mut tx, follow_up, clock.try_now().unwrap()).unwrap();

    let mut rep = piggybacked(&sent(&tx, 1), &[1; 16]);
    rep.set_block2(Block::new(16, 1, true));
    assert_eq!(codec.classify(&mut tx, &rep, clock.try_now().unwrap()).unwrap(),
               Status::BlockwiseReceiving);

    let auto = sent(&tx, 2);
    assert_eq!(auto.block2(), Some(Block::new(16, 2, false)));
    assert!(auto.payload().is_empty());

    // replayed block 1 is ignored
    assert_eq!(codec.classify(&mut tx, &rep, clock.try_now().unwrap()).unwrap(),
               Status::Stale);

    let mut rep = piggybacked(&auto, &[2; 5]);
    rep.set_block2(Block::new(16, 2, false));

    let mut tail = vec![1; 16];
    tail.extend([2; 5]);
    assert_eq!(codec.classify(&mut tx, &rep, clock.try_now().unwrap()).unwrap(),
               Status::BlockwiseReceived(tail));
  }

  #[test]
  fn clear_forgets_transfers() {
    let clock = ClockMock::new();
    let mut codec = codec(16);
    let mut tx = TxMock::default();

    codec.send(&mut tx, req(&[0; 40]), clock.try_now().unwrap()).unwrap();
    codec.clear();

    clock.set(10_000);
    codec.tick(&mut tx, clock.try_now().unwrap()).unwrap();
    assert_eq!(tx.sent.len(), 1);

    let first = sent(&tx, 0);
    let cont = Message::new(Type::Ack, Code::CONTINUE, first.id, first.token);
    assert_eq!(codec.classify(&mut tx, &cont, clock.try_now().unwrap()).unwrap(),
               Status::Stale);
  }
}
