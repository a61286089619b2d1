use std::collections::TryReserveError;

use kta_msg::{Block, BLOCK_SIZES};

/// Pick the block size to negotiate for a transport MTU.
///
/// Yields the largest of `16, 32, .., 1024` that fits in `mtu`,
/// or `16` if none does.
///
/// ```
/// use kta::mtu_to_block_size;
///
/// assert_eq!(mtu_to_block_size(1472), 1024);
/// assert_eq!(mtu_to_block_size(300), 256);
/// assert_eq!(mtu_to_block_size(10), 16);
/// ```
pub fn mtu_to_block_size(mtu: u32) -> u16 {
  BLOCK_SIZES.iter()
             .copied()
             .filter(|size| u32::from(*size) <= mtu)
             .last()
             .unwrap_or(BLOCK_SIZES[0])
}

/// A request body being sent with Block1
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Outbound {
  body: Vec<u8>,
  sent: Block,
}

impl Outbound {
  /// Split `body` into blocks of `size`, yielding the
  /// state along with the first block & its payload.
  pub(crate) fn start(body: Vec<u8>, size: u16) -> (Self, Block, Vec<u8>) {
    let first = Block::new(size, 0, body.len() > size as usize);
    let chunk = Self::chunk(&body, first).to_vec();

    (Self { body, sent: first }, first, chunk)
  }

  /// Are there blocks left to send?
  pub(crate) fn has_more(&self) -> bool {
    self.sent.more()
  }

  /// Advance to the next block.
  ///
  /// If the server asked for a smaller block size (by echoing a
  /// smaller Block1 in its 2.31 Continue) the block number is
  /// recalculated so that no bytes are skipped.
  pub(crate) fn advance(&mut self, server: Option<Block>) -> (Block, &[u8]) {
    let size = server.map(|b| b.size().min(self.sent.size()))
                     .unwrap_or_else(|| self.sent.size());
    let offset = self.sent.offset() + self.sent.size() as usize;
    let num = (offset / size as usize) as u32;
    let more = offset + (size as usize) < self.body.len();

    self.sent = Block::new(size, num, more);
    (self.sent, Self::chunk(&self.body, self.sent))
  }

  fn chunk(body: &[u8], block: Block) -> &[u8] {
    let start = block.offset().min(body.len());
    let end = (start + block.size() as usize).min(body.len());
    &body[start..end]
  }
}

/// A response body being received with Block2
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Inbound {
  expected: u32,
  tail: Vec<u8>,
}

impl Inbound {
  pub(crate) fn expect(&mut self, num: u32) {
    self.expected = num;
  }

  pub(crate) fn expects(&self, block: Block) -> bool {
    block.num() == self.expected
  }

  /// Append a block's payload
  pub(crate) fn append(&mut self, payload: &[u8]) -> Result<(), TryReserveError> {
    self.tail.try_reserve_exact(payload.len())?;
    self.tail.extend_from_slice(payload);
    Ok(())
  }

  pub(crate) fn into_tail(self) -> Vec<u8> {
    self.tail
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn block_size_for_mtu() {
    assert_eq!(mtu_to_block_size(0), 16);
    assert_eq!(mtu_to_block_size(10), 16);
    assert_eq!(mtu_to_block_size(16), 16);
    assert_eq!(mtu_to_block_size(31), 16);
    assert_eq!(mtu_to_block_size(32), 32);
    assert_eq!(mtu_to_block_size(300), 256);
    assert_eq!(mtu_to_block_size(1023), 512);
    assert_eq!(mtu_to_block_size(1024), 1024);
    assert_eq!(mtu_to_block_size(1472), 1024);
    assert_eq!(mtu_to_block_size(u32::MAX), 1024);
  }

  #[test]
  fn block_size_is_largest_fitting() {
    for mtu in (0..5000).chain([u32::MAX - 1, u32::MAX]) {
      let size = mtu_to_block_size(mtu);
      assert!(BLOCK_SIZES.contains(&size));
      assert!(u32::from(size) <= mtu || size == 16);
      assert!(BLOCK_SIZES.iter()
                         .all(|s| *s <= size || u32::from(*s) > mtu));
    }
  }

  #[test]
  fn outbound_walks_body() {
    let body = (0..40u8).collect::<Vec<_>>();
    let (mut out, first, chunk) = Outbound::start(body, 16);

    assert_eq!(first, Block::new(16, 0, true));
    assert_eq!(chunk, (0..16u8).collect::<Vec<_>>());
    assert!(out.has_more());

    let (b, chunk) = out.advance(None);
    assert_eq!(b, Block::new(16, 1, true));
    assert_eq!(chunk, (16..32u8).collect::<Vec<_>>().as_slice());

    let (b, chunk) = out.advance(None);
    assert_eq!(b, Block::new(16, 2, false));
    assert_eq!(chunk, (32..40u8).collect::<Vec<_>>().as_slice());
    assert!(!out.has_more());
  }

  #[test]
  fn outbound_honors_smaller_server_size() {
    let body = vec![0u8; 100];
    let (mut out, _, _) = Outbound::start(body, 64);

    let (b, chunk) = out.advance(Some(Block::new(32, 0, false)));
    assert_eq!(b, Block::new(32, 2, true));
    assert_eq!(chunk.len(), 32);

    let (b, chunk) = out.advance(None);
    assert_eq!(b, Block::new(32, 3, false));
    assert_eq!(chunk.len(), 4);
  }

  #[test]
  fn inbound_appends_in_order() {
    let mut inbound = Inbound::default();
    inbound.expect(1);
    assert!(inbound.expects(Block::new(16, 1, true)));
    assert!(!inbound.expects(Block::new(16, 2, true)));

    inbound.append(b"abc").unwrap();
    inbound.append(b"def").unwrap();
    assert_eq!(inbound.into_tail(), b"abcdef".to_vec());
  }
}
