use core::ops::RangeInclusive;

use embedded_time::duration::Milliseconds;
use embedded_time::Instant;
use rand::{Rng, SeedableRng};

use crate::time::{self, Clock, Millis};

/// A non-blocking timer that allows a fixed-delay or exponential-backoff retry,
/// that lives alongside some operation to retry.
///
/// The codec uses this to decide when to resend an unacknowledged
/// confirmable request.
///
/// ```
/// use embedded_time::duration::Milliseconds;
/// use kta::retry;
/// # use kta::time::Millis;
/// # struct Fake(std::cell::Cell<u64>);
/// # impl embedded_time::Clock for Fake {
/// #   type T = u64;
/// #   const SCALING_FACTOR: embedded_time::rate::Fraction = embedded_time::rate::Fraction::new(1, 1000);
/// #   fn try_now(&self) -> Result<embedded_time::Instant<Self>, embedded_time::clock::Error> {
/// #     Ok(embedded_time::Instant::new(self.0.get()))
/// #   }
/// # }
/// # impl kta::time::Clock for Fake {
/// #   fn sleep(&self, dur: Millis) { self.0.set(self.0.get() + dur.0) }
/// # }
/// use embedded_time::Clock as _;
/// use kta::time::Clock as _;
///
/// let clock = Fake(Default::default());
/// let now = || clock.try_now().unwrap();
/// let strategy = retry::Strategy::Delay { min: Milliseconds(2_000),
///                                         max: Milliseconds(2_000) };
/// let mut timer = retry::RetryTimer::new(now(), strategy, retry::Attempts(2));
///
/// assert_eq!(timer.what_should_i_do(now()), Err(nb::Error::WouldBlock));
///
/// clock.sleep(Milliseconds(2_000));
/// assert_eq!(timer.what_should_i_do(now()), Ok(retry::YouShould::Retry));
/// assert_eq!(timer.what_should_i_do(now()), Ok(retry::YouShould::Cry));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RetryTimer<C: Clock> {
  start: Instant<C>,
  init: Millis,
  strategy: Strategy,
  attempts: Attempts,
  max_attempts: Attempts,
}

/// A number of attempts
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Attempts(pub u16);

/// Result of [`RetryTimer::what_should_i_do`] and [`Budget::spend`].
///
/// This tells you if a retry should be attempted or not.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum YouShould {
  /// Attempts have been exhausted and the work that is
  /// being retried should be considered poisoned.
  Cry,
  /// A retry should be performed
  Retry,
}

impl<C: Clock> RetryTimer<C> {
  /// Create a new retrier.
  ///
  /// `max_attempts` includes the first attempt, which is
  /// assumed to have happened at `start`.
  pub fn new(start: Instant<C>, strategy: Strategy, max_attempts: Attempts) -> Self {
    Self { start,
           strategy,
           init: if strategy.has_jitter() {
             let seed = time::since_epoch(start).0;
             let mut rand = rand_chacha::ChaCha8Rng::seed_from_u64(seed);

             Milliseconds(rand.gen_range(strategy.range()))
           } else {
             Milliseconds(*strategy.range().start())
           },
           max_attempts,
           attempts: Attempts(1) }
  }

  /// Number of attempts made so far, including the first
  pub fn attempts(&self) -> Attempts {
    self.attempts
  }

  /// When the thing we keep trying fails, invoke this to
  /// tell the retrytimer "it failed again! what do I do??"
  ///
  /// Returns `nb::Error::WouldBlock` when we have not yet
  /// waited the appropriate amount of time to retry.
  pub fn what_should_i_do(&mut self,
                          now: Instant<C>)
                          -> nb::Result<YouShould, core::convert::Infallible> {
    if self.attempts >= self.max_attempts {
      Ok(YouShould::Cry)
    } else {
      let ready = self.is_ready(time::elapsed(self.start, now), self.attempts.0);
      if ready {
        self.attempts.0 += 1;
        Ok(YouShould::Retry)
      } else {
        Err(nb::Error::WouldBlock)
      }
    }
  }

  /// Check if the strategy says an appropriate time has passed
  pub fn is_ready(&self, Milliseconds(time_passed): Millis, attempts: u16) -> bool {
    if attempts == 0 {
      return true;
    }

    match self.strategy {
      | Strategy::Delay { .. } => time_passed >= (self.init.0 * attempts as u64),
      | Strategy::Exponential { .. } => {
        time_passed >= Strategy::total_delay_exp(self.init, attempts)
      },
    }
  }
}

/// Strategy to employ when retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
  /// Generate a random delay between `min` and `max`,
  /// and wait until this delay has passed between attempts.
  ///
  /// After each failed attempt, double the delay before retrying again.
  Exponential {
    /// Minimum (inclusive) delay for second attempt
    init_min: Millis,
    /// Maximum (inclusive) delay for second attempt
    init_max: Millis,
  },
  /// Generate a random delay between `min` and `max`,
  /// and wait until this delay has passed between attempts.
  Delay {
    /// Minimum (inclusive) delay for attempts
    min: Millis,
    /// Maximum (inclusive) delay for attempts
    max: Millis,
  },
}

impl Strategy {
  /// A fixed delay with no jitter
  pub const fn fixed(delay: Millis) -> Self {
    Self::Delay { min: delay,
                  max: delay }
  }

  /// Are min & max delays the same? if so, we should probably skip the random number generation.
  pub fn has_jitter(&self) -> bool {
    let rng = self.range();
    rng.start() != rng.end()
  }

  /// Get the min & max durations as an inclusive range
  pub fn range(&self) -> RangeInclusive<u64> {
    match self {
      | &Self::Delay { min: Milliseconds(min),
                       max: Milliseconds(max), } => (min..=max),

      | &Self::Exponential { init_min: Milliseconds(min),
                             init_max: Milliseconds(max), } => (min..=max),
    }
  }

  /// Get the amount of time this strategy will take if all attempts fail
  pub fn max_time(&self, max_attempts: Attempts) -> Millis {
    Milliseconds(match self {
                   | Self::Exponential { init_max, .. } => {
                     Self::total_delay_exp(*init_max, max_attempts.0)
                   },
                   | Self::Delay { max: Milliseconds(max),
                                   .. } => max * max_attempts.0 as u64,
                 })
  }

  /// Given the initial delay and number of attempts that have been performed,
  /// yields the delay until the next retry should be attempted.
  const fn total_delay_exp(Milliseconds(init): Millis, attempt: u16) -> u64 {
    // | attempt | total delay      |
    // | 1       | init             |
    // | 2       | init * 2         |
    // | 3       | init * 4         |
    // | ...     | ...              |
    // | n       | init * 2^n       |
    if attempt == 0 {
      return 0;
    }

    init * 2u64.pow((attempt - 1) as u32)
  }
}

/// A named, configurable retry budget.
///
/// The exchange engine has two of these that never interact:
/// a blocking "poll for data" budget spent by the orchestrator, and a
/// non-blocking retransmission budget spent by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  /// Number of retries allowed after the first attempt
  pub max_retries: Attempts,
  /// How long to wait between attempts
  pub strategy: Strategy,
}

impl RetryPolicy {
  /// A policy of `max_retries` retries, `delay` apart
  pub const fn fixed(max_retries: u16, delay: Millis) -> Self {
    Self { max_retries: Attempts(max_retries),
           strategy: Strategy::fixed(delay) }
  }

  /// The delay to block for between two attempts of a blocking retry loop
  pub fn wait(&self) -> Millis {
    Milliseconds(*self.strategy.range().start())
  }

  /// Start a countdown for a blocking retry loop
  pub fn budget(&self) -> Budget {
    Budget { remaining: self.max_retries.0,
             max: self.max_retries }
  }

  /// Start a non-blocking timer whose first attempt happened at `start`
  pub fn timer<C: Clock>(&self, start: Instant<C>) -> RetryTimer<C> {
    RetryTimer::new(start,
                    self.strategy,
                    Attempts(self.max_retries.0.saturating_add(1)))
  }

  /// Total time spent waiting if every retry is used
  pub fn max_time(&self) -> Millis {
    self.strategy.max_time(self.max_retries)
  }
}

/// Countdown of retries remaining in a blocking retry loop.
///
/// ```
/// use embedded_time::duration::Milliseconds;
/// use kta::retry::{RetryPolicy, YouShould};
///
/// let mut budget = RetryPolicy::fixed(2, Milliseconds(200)).budget();
///
/// assert_eq!(budget.spend(), YouShould::Retry);
/// assert_eq!(budget.spend(), YouShould::Retry);
/// assert_eq!(budget.spend(), YouShould::Cry);
///
/// budget.refill();
/// assert_eq!(budget.remaining(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget {
  remaining: u16,
  max: Attempts,
}

impl Budget {
  /// Use one retry, if any are left
  pub fn spend(&mut self) -> YouShould {
    match self.remaining.checked_sub(1) {
      | Some(n) => {
        self.remaining = n;
        YouShould::Retry
      },
      | None => YouShould::Cry,
    }
  }

  /// Restore the full budget
  pub fn refill(&mut self) {
    self.remaining = self.max.0;
  }

  /// Retries left
  pub fn remaining(&self) -> u16 {
    self.remaining
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::test::ClockMock;

  #[test]
  fn delay_retrier() {
    let clock = ClockMock::new();
    let now = || embedded_time::Clock::try_now(&clock).unwrap();
    let mut retry = RetryTimer::new(now(),
                                    Strategy::Delay { min: Milliseconds(1000),
                                                      max: Milliseconds(1000) },
                                    Attempts(5));

    // attempt 1 happens before asking what_should_i_do

    clock.set(999);
    assert_eq!(retry.what_should_i_do(now()).unwrap_err(),
               nb::Error::WouldBlock);

    clock.set(1000);
    assert_eq!(retry.what_should_i_do(now()).unwrap(), YouShould::Retry);
    // Fails again (attempt 2)

    clock.set(1999);
    assert_eq!(retry.what_should_i_do(now()).unwrap_err(),
               nb::Error::WouldBlock);

    clock.set(2000);
    assert_eq!(retry.what_should_i_do(now()).unwrap(), YouShould::Retry);
    // Fails again (attempt 3)

    clock.set(10_000);
    assert_eq!(retry.what_should_i_do(now()).unwrap(), YouShould::Retry);
    assert_eq!(retry.what_should_i_do(now()).unwrap(), YouShould::Retry);
    assert_eq!(retry.attempts(), Attempts(5));

    assert_eq!(retry.what_should_i_do(now()).unwrap(), YouShould::Cry);
  }

  #[test]
  fn exponential_retrier() {
    let clock = ClockMock::new();
    let now = || embedded_time::Clock::try_now(&clock).unwrap();
    let mut retry = RetryTimer::new(now(),
                                    Strategy::Exponential { init_min: Milliseconds(1000),
                                                            init_max: Milliseconds(1000) },
                                    Attempts(4));

    clock.set(999);
    assert_eq!(retry.what_should_i_do(now()).unwrap_err(),
               nb::Error::WouldBlock);

    clock.set(1000);
    assert_eq!(retry.what_should_i_do(now()).unwrap(), YouShould::Retry);

    clock.set(1999);
    assert_eq!(retry.what_should_i_do(now()).unwrap_err(),
               nb::Error::WouldBlock);

    clock.set(2000);
    assert_eq!(retry.what_should_i_do(now()).unwrap(), YouShould::Retry);

    clock.set(4000);
    assert_eq!(retry.what_should_i_do(now()).unwrap(), YouShould::Retry);

    assert_eq!(retry.what_should_i_do(now()).unwrap(), YouShould::Cry);
  }

  #[test]
  fn jittered_delay_stays_in_range() {
    let clock = ClockMock::new();
    clock.set(12_345);
    let now = || embedded_time::Clock::try_now(&clock).unwrap();
    let retry = RetryTimer::new(now(),
                                Strategy::Delay { min: Milliseconds(100),
                                                  max: Milliseconds(200) },
                                Attempts(2));

    assert!((100..=200).contains(&retry.init.0));
  }

  #[test]
  fn exp_calculation() {
    let init = Milliseconds(100);
    assert_eq!(Strategy::total_delay_exp(init, 1), 100);
    assert_eq!(Strategy::total_delay_exp(init, 2), 200);
    assert_eq!(Strategy::total_delay_exp(init, 3), 400);
  }

  #[test]
  fn policy_timer_counts_retries_after_first_attempt() {
    let clock = ClockMock::new();
    let now = || embedded_time::Clock::try_now(&clock).unwrap();
    let policy = RetryPolicy::fixed(3, Milliseconds(2_000));
    let mut timer = policy.timer(now());

    for n in 1..=3u64 {
      clock.set(n * 2_000);
      assert_eq!(timer.what_should_i_do(now()), Ok(YouShould::Retry));
    }

    clock.set(60_000);
    assert_eq!(timer.what_should_i_do(now()), Ok(YouShould::Cry));
    assert_eq!(policy.max_time(), Milliseconds(6_000u64));
  }
}
