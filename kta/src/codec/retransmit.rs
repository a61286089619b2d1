use embedded_time::Instant;
use kta_msg::Id;

use super::Tx;
use crate::error::What;
use crate::logging;
use crate::retry::{RetryTimer, YouShould};
use crate::time::Clock;

/// A confirmable datagram that has not been acknowledged yet
#[derive(Debug)]
pub(crate) struct Pending<C: Clock> {
  id: Id,
  dgram: Vec<u8>,
  timer: RetryTimer<C>,
}

impl<C: Clock> Pending<C> {
  pub(crate) fn new(id: Id, dgram: Vec<u8>, timer: RetryTimer<C>) -> Self {
    Self { id,
           dgram,
           timer }
  }

  pub(crate) fn id(&self) -> Id {
    self.id
  }

  /// Resend the datagram if it is time to.
  ///
  /// Yields `YouShould::Cry` once the retransmission budget is spent.
  pub(crate) fn poll<T: Tx>(&mut self,
                            tx: &mut T,
                            now: Instant<C>)
                            -> Result<YouShould, What<T::Error>> {
    match self.timer.what_should_i_do(now) {
      | Ok(YouShould::Retry) => {
        log::debug!("resending message {} (attempt {})",
                    self.id.0,
                    self.timer.attempts().0);
        logging::trace_dgram("tx", &self.dgram);
        tx.send(&self.dgram).map_err(What::Send)?;
        Ok(YouShould::Retry)
      },
      | Ok(YouShould::Cry) => Ok(YouShould::Cry),
      | Err(nb::Error::WouldBlock) => Ok(YouShould::Retry),
      | Err(nb::Error::Other(never)) => match never {},
    }
  }
}

#[cfg(test)]
mod tests {
  use embedded_time::Clock as _;

  use super::*;
  use crate::retry::RetryPolicy;
  use crate::test::{ClockMock, TxMock};
  use crate::time::Millis;

  #[test]
  fn resends_until_exhausted() {
    let clock = ClockMock::new();
    let policy = RetryPolicy::fixed(2, Millis::new(2_000));
    let mut pending = Pending::new(Id(1), vec![1, 2, 3], policy.timer(clock.try_now().unwrap()));
    let mut tx = TxMock::default();

    assert_eq!(pending.poll(&mut tx, clock.try_now().unwrap()).unwrap(),
               YouShould::Retry);
    assert!(tx.sent.is_empty());

    clock.set(2_000);
    pending.poll(&mut tx, clock.try_now().unwrap()).unwrap();
    assert_eq!(tx.sent, vec![vec![1, 2, 3]]);

    clock.set(4_000);
    pending.poll(&mut tx, clock.try_now().unwrap()).unwrap();
    assert_eq!(tx.sent.len(), 2);

    clock.set(60_000);
    assert_eq!(pending.poll(&mut tx, clock.try_now().unwrap()).unwrap(),
               YouShould::Cry);
    assert_eq!(tx.sent.len(), 2);
  }
}
