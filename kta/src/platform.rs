use core::fmt::Debug;
use core::marker::PhantomData;

use crate::entropy::Entropy;
use crate::net::Transport;
use crate::time::Clock;

/// Type-level bundle of the collaborators the exchange engine
/// depends on but does not implement.
pub trait PlatformTypes: Sized + 'static + Debug {
  /// See [`Transport`]
  type Transport: Transport + Debug;
  /// See [`Entropy`]
  type Entropy: Entropy + Debug;
  /// See [`Clock`]
  type Clock: Clock + Debug;
}

/// Error type of the platform's transport
pub type TransportError<P> = <<P as PlatformTypes>::Transport as Transport>::Error;

/// Socket type of the platform's transport
pub type Socket<P> = <<P as PlatformTypes>::Transport as Transport>::Socket;

/// Detailed engine error for a platform
pub type Error<P> = crate::error::Error<TransportError<P>>;

/// Detailed engine error (without context) for a platform
pub type What<P> = crate::error::What<TransportError<P>>;

/// [`PlatformTypes`] implementor for any combination of collaborators
#[derive(Debug, Clone, Copy)]
pub struct Alloc<T, R, C>(PhantomData<(T, R, C)>);

impl<T, R, C> PlatformTypes for Alloc<T, R, C>
  where T: Transport + Debug + 'static,
        R: Entropy + Debug + 'static,
        C: Clock + Debug + 'static
{
  type Transport = T;
  type Entropy = R;
  type Clock = C;
}

/// Instances of the collaborators an exchange engine uses
pub struct Platform<P: PlatformTypes> {
  /// See [`Transport`]
  pub transport: P::Transport,
  /// See [`Entropy`]
  pub entropy: P::Entropy,
  /// See [`Clock`]
  pub clock: P::Clock,
}

impl<P: PlatformTypes> Platform<P> {
  /// Bundle collaborators
  pub fn new(transport: P::Transport, entropy: P::Entropy, clock: P::Clock) -> Self {
    Self { transport,
           entropy,
           clock }
  }
}

impl<P: PlatformTypes> Debug for Platform<P> {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("Platform")
     .field("transport", &self.transport)
     .field("entropy", &self.entropy)
     .field("clock", &self.clock)
     .finish()
  }
}
