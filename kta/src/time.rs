use embedded_time::Instant;

/// A duration, in milliseconds
pub type Millis = embedded_time::duration::Milliseconds<u64>;

/// The clock collaborator.
///
/// Supertrait of [`embedded_time::Clock`] pinning the
/// type of "ticks" to u64, adding the ability to block
/// the calling thread.
pub trait Clock: embedded_time::Clock<T = u64> {
  /// Block the calling thread for (at least) `dur`
  fn sleep(&self, dur: Millis);
}

/// Milliseconds elapsed since the clock's epoch.
///
/// This is the "relative time" the exchange engine
/// uses to drive retransmission.
pub fn relative_time<C: Clock>(clock: &C) -> Result<Millis, embedded_time::clock::Error> {
  let now = clock.try_now()?;
  Ok(since_epoch(now))
}

/// Convert an instant into milliseconds since the clock's epoch,
/// saturating if the conversion overflows.
pub fn since_epoch<C: Clock>(now: Instant<C>) -> Millis {
  Millis::try_from(now.duration_since_epoch()).unwrap_or(Millis::new(u64::MAX))
}

/// Milliseconds elapsed between `start` and `now`.
///
/// A `now` earlier than `start` yields zero.
pub fn elapsed<C: Clock>(start: Instant<C>, now: Instant<C>) -> Millis {
  now.checked_duration_since(&start)
     .and_then(|dur| Millis::try_from(dur).ok())
     .unwrap_or(Millis::new(0))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test::ClockMock;

  #[test]
  fn elapsed_saturates_at_zero() {
    let clock = ClockMock::new();
    clock.set(100);
    let later = embedded_time::Clock::try_now(&clock).unwrap();
    clock.set(40);
    let earlier = embedded_time::Clock::try_now(&clock).unwrap();

    assert_eq!(elapsed(earlier, later), Millis::new(60));
    assert_eq!(elapsed(later, earlier), Millis::new(0));
  }

  #[test]
  fn relative_time_tracks_sleeps() {
    let clock = ClockMock::new();
    clock.sleep(Millis::new(200));
    clock.sleep(Millis::new(200));

    assert_eq!(relative_time(&clock).unwrap(), Millis::new(400));
  }
}
