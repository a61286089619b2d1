/// A cursor over a byte buffer, in the spirit of [`std::io::Cursor`]
/// but yielding borrowed slices instead of copying into a buffer.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Cursor<T> {
  t: T,
  cursor: usize,
  len: usize,
}

impl<T: AsRef<[u8]>> Cursor<T> {
  /// Creates a new cursor
  pub fn new(t: T) -> Cursor<T> {
    let len = t.as_ref().len();
    Cursor { t, cursor: 0, len }
  }

  /// Unwraps the cursor, discarding its internal position
  pub fn into_inner(self) -> T {
    self.t
  }

  fn peek_(len: usize, cursor: usize, t: &T, n: usize) -> Option<&[u8]> {
    if n > len - cursor {
      None
    } else {
      Some(&t.as_ref()[cursor..cursor + n])
    }
  }

  /// Take the next byte in the cursor, returning None
  /// if the cursor is exhausted.
  pub fn next(&mut self) -> Option<u8> {
    self.take_exact(1).and_then(|a| match a {
                        | &[a] => Some(a),
                        | _ => None,
                      })
  }

  /// Take `n` bytes from the cursor, stopping early if
  /// the end of the buffer is encountered.
  pub fn take(&mut self, n: usize) -> &[u8] {
    let n = n.min(self.remaining());
    let start = self.cursor;
    self.cursor += n;
    &self.t.as_ref()[start..start + n]
  }

  /// Take `n` bytes from the cursor, returning None if
  /// the end of the buffer is encountered.
  pub fn take_exact(&mut self, n: usize) -> Option<&[u8]> {
    Self::peek_(self.len, self.cursor, &self.t, n).map(|a| {
                                                    self.cursor += n;
                                                    a
                                                  })
  }

  /// Without advancing the position, look at the next
  /// `n` bytes, returning None if there are less than `n` bytes
  /// remaining.
  pub fn peek_exact(&self, n: usize) -> Option<&[u8]> {
    Self::peek_(self.len, self.cursor, &self.t, n)
  }

  /// Consume all remaining bytes
  pub fn take_until_end(&mut self) -> &[u8] {
    let start = self.cursor;
    self.cursor = self.len;
    &self.t.as_ref()[start..]
  }

  /// Whether the cursor has reached the end
  /// of the buffer.
  pub fn is_exhausted(&self) -> bool {
    self.cursor >= self.len
  }

  /// Number of bytes not yet consumed
  pub fn remaining(&self) -> usize {
    self.len - self.cursor
  }

  /// Get the position the cursor points to within
  /// the buffer
  pub fn position(&self) -> usize {
    self.cursor
  }
}
