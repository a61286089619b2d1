/// Block sizes allowed by RFC7959, smallest first
pub const BLOCK_SIZES: [u16; 7] = [16, 32, 64, 128, 256, 512, 1024];

/// # Block1 / Block2 option value
///
/// Three items of information may need to be transferred in a
/// Block (Block1 or Block2) option:
/// * the size of the block ([`Block::size`])
/// * whether more blocks are following ([`Block::more`])
/// * the relative number of the block ([`Block::num`]) within a sequence of blocks with the given size.
///
/// On the wire these are packed into a uint as `num << 4 | more << 3 | szx`
/// where the size is `2 ^ (szx + 4)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Block(u32);

impl Block {
  /// Create a Block value; `size` is rounded down to a power of two
  /// and clamped to `16..=1024`.
  pub fn new(size: u16, num: u32, more: bool) -> Self {
    let num = num << 4;
    let more = u32::from(more) << 3;
    let size = size.clamp(16, 1024);
    // floor(log2(size)) - 4
    let szx = (15 - size.leading_zeros()) - 4;

    Self(num | more | szx)
  }

  #[allow(missing_docs)]
  pub fn size(&self) -> u16 {
    let szx = (self.0 & 0b111).min(6);
    2u16.pow(szx + 4)
  }

  #[allow(missing_docs)]
  pub fn more(&self) -> bool {
    (self.0 & 0b1000) >> 3 == 1
  }

  #[allow(missing_docs)]
  pub fn num(&self) -> u32 {
    self.0 >> 4
  }

  /// The block following this one, keeping the size exponent
  /// and clearing the `more` flag.
  ///
  /// ```
  /// use kta_msg::Block;
  ///
  /// let first = Block::new(1024, 0, true);
  /// assert_eq!(first.next(), Block::new(1024, 1, false));
  /// ```
  pub fn next(&self) -> Self {
    Self(((self.num() + 1) << 4) | (self.0 & 0b111))
  }

  /// Byte offset of this block within the whole body
  pub fn offset(&self) -> usize {
    self.num() as usize * self.size() as usize
  }
}

impl From<Block> for u32 {
  fn from(b: Block) -> Self {
    b.0
  }
}

impl From<u32> for Block {
  fn from(n: u32) -> Self {
    Block(n)
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn block() {
    let b = Block(33);
    assert_eq!(b.size(), 32);
    assert_eq!(b.num(), 2);
    assert_eq!(b.more(), false);

    let b = Block(59);
    assert_eq!(b.size(), 128);
    assert_eq!(b.num(), 3);
    assert_eq!(b.more(), true);

    assert_eq!(Block::new(32, 2, false), Block(33));
    assert_eq!(Block::new(128, 3, true), Block(59));
  }

  #[test]
  fn size_rounds_down_to_nearest_power_of_two() {
    assert_eq!(Block::new(0, 1, false).size(), 16);
    assert_eq!(Block::new(10, 1, false).size(), 16);
    assert_eq!(Block::new(17, 1, false).size(), 16);
    assert_eq!(Block::new(31, 1, false).size(), 16);
    assert_eq!(Block::new(33, 1, false).size(), 32);
    assert_eq!(Block::new(64, 1, false).size(), 64);
    assert_eq!(Block::new(1024, 1, false).size(), 1024);
    assert_eq!(Block::new(2048, 1, false).size(), 1024);
  }

  #[test]
  fn next_keeps_size_and_clears_more() {
    let b = Block::new(256, 4, true).next();
    assert_eq!(b.num(), 5);
    assert_eq!(b.size(), 256);
    assert!(!b.more());
    assert_eq!(b.offset(), 5 * 256);
  }
}
