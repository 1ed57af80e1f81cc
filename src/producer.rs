use super::consumer::*;
use super::error::*;
use super::signal::*;

use futures::future::{BoxFuture};

/// The deferred outcome of attaching a consumer to a producer
///
/// Resolves with the consumer's final observed state once the producer is done
/// with it, or with an error if the feeding side was shut down with one.
pub type Attach<E, A> = BoxFuture<'static, Result<Consumer<E, A>, StreamError>>;

///
/// A producer drives signals into a consumer until the consumer reaches a
/// terminal state or the producer exhausts its input
///
pub trait Producer<E>: Send+Sync {
    ///
    /// Attaches a consumer to this producer
    ///
    /// The returned deferred result resolves once the consumer is finished with
    /// this producer's input; for producers that support more than one consumer,
    /// each attach gets its own deferred result.
    ///
    fn apply<A: 'static+Send>(&self, consumer: Consumer<E, A>) -> Attach<E, A>;
}

///
/// A producer that feeds a fixed sequence of signals
///
/// Every attach replays the same sequence from the start. Mostly useful for
/// composition and testing; note that the sequence does not need to finish with
/// `EndOfStream` (a producer that exhausts its input leaves the consumer active).
///
pub struct SignalProducer<E> {
    signals: Vec<Signal<E>>,
}

impl<E: Clone> SignalProducer<E> {
    ///
    /// Creates a producer that feeds the supplied signals in order
    ///
    pub fn signals(signals: Vec<Signal<E>>) -> SignalProducer<E> {
        SignalProducer {
            signals: signals
        }
    }

    ///
    /// Creates a producer that feeds the supplied elements in order, leaving the
    /// stream open afterwards
    ///
    pub fn elements(elements: Vec<E>) -> SignalProducer<E> {
        SignalProducer {
            signals: elements.into_iter().map(|element| Signal::Element(element)).collect()
        }
    }
}

impl<E: 'static+Send+Sync+Clone> Producer<E> for SignalProducer<E> {
    fn apply<A: 'static+Send>(&self, consumer: Consumer<E, A>) -> Attach<E, A> {
        let signals = self.signals.clone();

        Box::pin(async move {
            let mut consumer = consumer;

            for signal in signals {
                if consumer.is_terminal() {
                    break;
                }

                consumer = consumer.feed(signal).await;
            }

            Ok(consumer)
        })
    }
}
