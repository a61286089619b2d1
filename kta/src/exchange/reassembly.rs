use std::collections::TryReserveError;

/// The response body of one exchange.
///
/// Arrives as up to two chunks: the payload of the first response,
/// and (for block-wise responses) the rest of the body assembled by the codec.
/// Each chunk can be taken exactly once.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Reassembly {
  first: Option<Vec<u8>>,
  tail: Option<Vec<u8>>,
}

impl Reassembly {
  /// Copy the payload of the first response
  pub(crate) fn set_first(&mut self, payload: &[u8]) -> Result<(), TryReserveError> {
    let mut first = Vec::new();
    first.try_reserve_exact(payload.len())?;
    first.extend_from_slice(payload);
    self.first = Some(first);
    Ok(())
  }

  pub(crate) fn set_tail(&mut self, tail: Vec<u8>) {
    self.tail = Some(tail);
  }

  pub(crate) fn take_first(&mut self) -> Option<Vec<u8>> {
    self.first.take()
  }

  pub(crate) fn take_tail(&mut self) -> Option<Vec<u8>> {
    self.tail.take()
  }

  pub(crate) fn len(&self) -> usize {
    self.first.as_ref().map(Vec::len).unwrap_or(0) + self.tail.as_ref().map(Vec::len).unwrap_or(0)
  }

  /// Copy first then tail into `buf`, truncating
  /// whatever doesn't fit. Yields the number of bytes written.
  pub(crate) fn copy_into(mut self, buf: &mut [u8]) -> usize {
    let mut written = 0;

    for chunk in [self.take_first(), self.take_tail()].into_iter().flatten() {
      let n = chunk.len().min(buf.len() - written);
      buf[written..written + n].copy_from_slice(&chunk[..n]);
      written += n;
    }

    written
  }

  /// Concatenate first and tail, keeping at most `capacity` bytes
  pub(crate) fn into_vec(mut self, capacity: usize) -> Result<Vec<u8>, TryReserveError> {
    let len = self.len().min(capacity);

    match (self.take_first(), self.take_tail()) {
      | (Some(mut first), None) if first.len() <= capacity => {
        first.shrink_to_fit();
        Ok(first)
      },
      | (first, tail) => {
        let mut out = Vec::new();
        out.try_reserve_exact(len)?;

        for chunk in [first, tail].into_iter().flatten() {
          let n = chunk.len().min(len - out.len());
          out.extend_from_slice(&chunk[..n]);
        }

        Ok(out)
      },
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn chunks(first: &[u8], tail: &[u8]) -> Reassembly {
    let mut r = Reassembly::default();
    r.set_first(first).unwrap();
    r.set_tail(tail.to_vec());
    r
  }

  #[test]
  fn empty() {
    assert_eq!(Reassembly::default().copy_into(&mut [0; 4]), 0);
    assert_eq!(Reassembly::default().into_vec(4).unwrap(), Vec::<u8>::new());
  }

  #[test]
  fn concatenates_in_order() {
    let mut buf = [0u8; 8];
    assert_eq!(chunks(b"abc", b"def").copy_into(&mut buf), 6);
    assert_eq!(&buf[..6], b"abcdef");

    assert_eq!(chunks(b"abc", b"def").into_vec(64).unwrap(), b"abcdef".to_vec());
  }

  #[test]
  fn truncates_to_capacity() {
    let mut buf = [0u8; 4];
    assert_eq!(chunks(b"abc", b"def").copy_into(&mut buf), 4);
    assert_eq!(&buf, b"abcd");

    assert_eq!(chunks(b"abc", b"def").into_vec(2).unwrap(), b"ab".to_vec());

    let mut first_only = Reassembly::default();
    first_only.set_first(b"hello").unwrap();
    assert_eq!(first_only.into_vec(3).unwrap(), b"hel".to_vec());
  }

  #[test]
  fn chunks_are_taken_once() {
    let mut r = chunks(b"a", b"b");
    assert_eq!(r.take_first(), Some(b"a".to_vec()));
    assert_eq!(r.take_first(), None);
    assert_eq!(r.take_tail(), Some(b"b".to_vec()));
    assert_eq!(r.len(), 0);
  }
}
