use super::consumer::*;
use super::error::*;
use super::producer::*;
use super::relay_core::*;
use super::signal::*;

use futures::future::{BoxFuture};

use std::sync::*;

///
/// Where a channel delivers its signals
///
/// Implemented by the broadcast distribution and the unicast adapter; `deliver`
/// completes once the coordination step for the signal has finished, `settle`
/// permanently closes the distribution (recorded exactly once).
///
pub (crate) trait PushTarget<E>: Send+Sync {
    fn deliver(&self, signal: Signal<E>) -> BoxFuture<'static, ()>;
    fn settle(&self, outcome: Outcome);
}

///
/// The imperative side of a push-driven stream
///
/// A channel is created paired with a distribution (see `broadcast` and
/// `unicast`); the caller owns it and can push from any thread. Closing is
/// idempotent: the first `end` or `end_with_error` records the outcome, and
/// every later call (and every later attach on the consuming side) just sees
/// the recorded outcome.
///
/// `end` is a graceful close: it resolves everything waiting on the channel
/// *without* delivering `EndOfStream`, so attached consumers remain active and
/// could in principle be fed from elsewhere. To terminate the consumers
/// themselves, use `push_end_of_stream_then_end`.
///
pub struct Channel<E> {
    target: Arc<dyn PushTarget<E>>,
}

impl<E> Clone for Channel<E> {
    fn clone(&self) -> Channel<E> {
        Channel {
            target: Arc::clone(&self.target)
        }
    }
}

impl<E: 'static+Send> Channel<E> {
    ///
    /// Creates a channel over a push target
    ///
    pub (crate) fn from_target(target: Arc<dyn PushTarget<E>>) -> Channel<E> {
        Channel {
            target: target
        }
    }

    ///
    /// Pushes one signal into the distribution this channel feeds
    ///
    /// The returned future completes once the coordination step for the signal
    /// has finished (every currently attached consumer has accepted it).
    ///
    pub fn push(&self, signal: Signal<E>) -> BoxFuture<'static, ()> {
        self.target.deliver(signal)
    }

    ///
    /// Pushes one element (sugar for pushing `Signal::Element`)
    ///
    pub fn push_item(&self, item: E) -> BoxFuture<'static, ()> {
        self.target.deliver(Signal::Element(item))
    }

    ///
    /// Closes the channel gracefully
    ///
    /// Everything currently waiting resolves with success and future attaches
    /// resolve immediately; no `EndOfStream` is delivered. Calling this more
    /// than once has no further effect.
    ///
    pub fn end(&self) {
        self.target.settle(Outcome::Completed);
    }

    ///
    /// Closes the channel with an error
    ///
    /// The error is reported to everything currently waiting and to every
    /// future attach.
    ///
    pub fn end_with_error(&self, error: StreamError) {
        self.target.settle(Outcome::Failed(error));
    }

    ///
    /// Pushes `EndOfStream` to the attached consumers, then closes the channel
    ///
    pub fn push_end_of_stream_then_end(&self) -> BoxFuture<'static, ()> {
        let target = Arc::clone(&self.target);

        Box::pin(async move {
            target.deliver(Signal::EndOfStream).await;
            target.settle(Outcome::Completed);
        })
    }
}

///
/// The consuming side of a broadcast channel: a producer that fans every pushed
/// signal out to all currently attached consumers
///
/// Consumers can attach at any time; each one only sees the signals pushed
/// after it attached, and its deferred result resolves when it reaches a
/// terminal state (or when the channel is closed).
///
pub struct BroadcastDistributor<E> {
    core: Arc<Mutex<RelayCore<E>>>,
}

impl<E: 'static+Send+Clone> Producer<E> for BroadcastDistributor<E> {
    fn apply<A: 'static+Send>(&self, consumer: Consumer<E, A>) -> Attach<E, A> {
        attach(&self.core, consumer)
    }
}

/// The push target feeding a broadcast distribution
struct BroadcastTarget<E> {
    core: Arc<Mutex<RelayCore<E>>>,
}

impl<E: 'static+Send+Clone> PushTarget<E> for BroadcastTarget<E> {
    fn deliver(&self, signal: Signal<E>) -> BoxFuture<'static, ()> {
        let step = relay(&self.core, signal);

        Box::pin(async move {
            step.await;
        })
    }

    fn settle(&self, outcome: Outcome) {
        settle(&self.core, outcome);
    }
}

///
/// Creates a broadcast distribution, returning the producer side and the
/// channel that feeds it
///
/// Signals pushed while no consumer is attached are discarded; signals pushed
/// afterwards are delivered to every attached consumer in push order.
///
pub fn broadcast<E: 'static+Send+Clone>() -> (BroadcastDistributor<E>, Channel<E>) {
    let core        = Arc::new(Mutex::new(RelayCore::new()));

    let distributor = BroadcastDistributor  { core: Arc::clone(&core) };
    let channel     = Channel::from_target(Arc::new(BroadcastTarget { core: core }));

    (distributor, channel)
}
