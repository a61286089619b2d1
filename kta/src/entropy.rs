/// The entropy collaborator; fills buffers with random bytes
/// for request tokens and the initial message ID.
///
/// Implemented for every [`rand::RngCore`], so any `rand` generator
/// (e.g. [`rand_chacha::ChaCha8Rng`]) can be used directly.
///
/// ```
/// use kta::entropy::Entropy;
/// use rand::SeedableRng;
///
/// let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(0);
/// let mut token = [0u8; 4];
/// rng.random_bytes(&mut token).unwrap();
/// ```
pub trait Entropy {
  /// Fill `buf` with random bytes
  fn random_bytes(&mut self, buf: &mut [u8]) -> Result<(), rand::Error>;
}

impl<R: rand::RngCore> Entropy for R {
  fn random_bytes(&mut self, buf: &mut [u8]) -> Result<(), rand::Error> {
    self.try_fill_bytes(buf)
  }
}

/// Generate a random u16
pub(crate) fn random_u16<E: Entropy>(entropy: &mut E) -> Result<u16, rand::Error> {
  let mut bytes = [0u8; 2];
  entropy.random_bytes(&mut bytes)?;
  Ok(u16::from_be_bytes(bytes))
}
