use super::error::*;
use super::signal::*;

use futures::future;
use futures::future::{BoxFuture, FutureExt};

///
/// A consumer is a state machine that accepts signals one at a time and eventually
/// produces a result or an error
///
/// Feeding a signal to an `Active` consumer yields a new consumer, possibly
/// asynchronously. `Finished` and `Failed` are terminal: feeding either is a no-op
/// that returns the same state. Both terminal states carry the leftover signal
/// that was not consumed (or `NoData` when there was none).
///
pub enum Consumer<E, A> {
    /// Ready to accept the next signal
    Active(Continuation<E, A>),

    /// Produced a result, along with the signal that was left unconsumed
    Finished(A, Signal<E>),

    /// Failed, along with the signal that was left unconsumed
    Failed(StreamError, Signal<E>),
}

///
/// The next step of an active consumer
///
pub struct Continuation<E, A> {
    step: Box<dyn FnOnce(Signal<E>) -> BoxFuture<'static, Consumer<E, A>>+Send>,
}

impl<E, A> Continuation<E, A> {
    ///
    /// Feeds a signal to this continuation, producing the consumer's next state
    ///
    #[inline]
    pub fn feed(self, signal: Signal<E>) -> BoxFuture<'static, Consumer<E, A>> {
        (self.step)(signal)
    }
}

impl<E: 'static+Send, A: 'static+Send> Consumer<E, A> {
    ///
    /// Creates an active consumer from a synchronous step function
    ///
    pub fn active<TStep>(step: TStep) -> Consumer<E, A>
    where TStep: 'static+Send+FnOnce(Signal<E>) -> Consumer<E, A> {
        Consumer::Active(Continuation {
            step: Box::new(move |signal| future::ready(step(signal)).boxed())
        })
    }

    ///
    /// Creates an active consumer from an asynchronous step function
    ///
    pub fn active_async<TStep>(step: TStep) -> Consumer<E, A>
    where TStep: 'static+Send+FnOnce(Signal<E>) -> BoxFuture<'static, Consumer<E, A>> {
        Consumer::Active(Continuation {
            step: Box::new(step)
        })
    }

    ///
    /// Wraps a deferred consumer as an active one
    ///
    /// The deferred consumer is resolved the first time a signal arrives (or when
    /// the result is extracted with `run`), then fed that signal.
    ///
    pub fn flatten(deferred: BoxFuture<'static, Consumer<E, A>>) -> Consumer<E, A> {
        Consumer::active_async(move |signal| {
            Box::pin(async move {
                deferred.await.feed(signal).await
            })
        })
    }

    ///
    /// Feeds one signal to this consumer
    ///
    /// Terminal consumers ignore the signal and return themselves unchanged.
    ///
    pub fn feed(self, signal: Signal<E>) -> BoxFuture<'static, Consumer<E, A>> {
        match self {
            Consumer::Active(continuation)  => continuation.feed(signal),
            terminal                        => future::ready(terminal).boxed(),
        }
    }

    ///
    /// True if this consumer has reached a terminal state
    ///
    pub fn is_terminal(&self) -> bool {
        match self {
            Consumer::Active(_) => false,
            _                   => true,
        }
    }

    ///
    /// Extracts the final result of this consumer
    ///
    /// If the consumer is still active it is fed `EndOfStream` first; a consumer
    /// that stays active even then produces an error.
    ///
    pub fn run(self) -> BoxFuture<'static, Result<A, StreamError>> {
        Box::pin(async move {
            let terminal = match self {
                Consumer::Active(continuation)  => continuation.feed(Signal::EndOfStream).await,
                terminal                        => terminal,
            };

            match terminal {
                Consumer::Finished(result, _)   => Ok(result),
                Consumer::Failed(error, _)      => Err(error),
                Consumer::Active(_)             => Err(StreamError::Aborted("consumer did not finish at the end of the stream".to_string())),
            }
        })
    }

    ///
    /// Creates a consumer that folds every element into an accumulator, finishing
    /// with the accumulated value when the stream ends
    ///
    pub fn fold<TFold>(initial: A, fold: TFold) -> Consumer<E, A>
    where TFold: 'static+Send+FnMut(A, E) -> A {
        fn step<E, A, TFold>(accumulator: A, mut fold: TFold) -> Consumer<E, A>
        where   E:      'static+Send,
                A:      'static+Send,
                TFold:  'static+Send+FnMut(A, E) -> A {
            Consumer::active(move |signal| {
                match signal {
                    Signal::Element(element)    => step(fold(accumulator, element), fold),
                    Signal::NoData              => step(accumulator, fold),
                    Signal::EndOfStream         => Consumer::Finished(accumulator, Signal::EndOfStream),
                }
            })
        }

        step(initial, fold)
    }
}

impl<E: 'static+Send> Consumer<E, Vec<E>> {
    ///
    /// Creates a consumer that collects every element into a list
    ///
    pub fn collect() -> Consumer<E, Vec<E>> {
        Consumer::fold(vec![], |mut collected, element| {
            collected.push(element);
            collected
        })
    }
}
