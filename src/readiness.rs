use super::consumer::*;
use super::error::*;
use super::signal::*;
use super::transformer::*;

use futures::future;
use futures::future::{BoxFuture, Either, FutureExt};
use tracing::{debug, trace};

use std::mem;
use std::time::{Duration};

///
/// Fails the stream if the inner consumer cannot accept a signal within a time
/// budget
///
/// Every data signal races the inner consumer's acceptance against a timer; if
/// the timer fires first the whole stream fails with a readiness timeout,
/// carrying the signal that timed out as leftover. Use this when a consumer
/// falling behind is a fatal condition for the stream.
///
pub struct FailIfNotReady {
    timeout: Duration,
}

impl FailIfNotReady {
    ///
    /// Creates an adapter that allows the inner consumer the given duration to
    /// accept each signal
    ///
    pub fn new(timeout: Duration) -> FailIfNotReady {
        FailIfNotReady {
            timeout: timeout
        }
    }
}

impl<E: 'static+Send+Clone> Transformer<E, E> for FailIfNotReady {
    fn apply<A: 'static+Send>(self, inner: Consumer<E, A>) -> Consumer<E, Consumer<E, A>> {
        fail_step(inner, self.timeout)
    }
}

fn fail_step<E, A>(inner: Consumer<E, A>, timeout: Duration) -> Consumer<E, Consumer<E, A>>
where   E: 'static+Send+Clone,
        A: 'static+Send {
    let continuation = match inner {
        Consumer::Active(continuation)  => continuation,
        terminal                        => { return Consumer::Finished(terminal, Signal::NoData); }
    };

    Consumer::active_async(move |signal| {
        Box::pin(async move {
            if signal.is_end_of_stream() {
                // The end of the stream always completes immediately, in-flight timers notwithstanding
                return Consumer::Finished(Consumer::Active(continuation), Signal::EndOfStream);
            }

            let feed    = continuation.feed(signal.clone());
            let timer   = Box::pin(tokio::time::sleep(timeout));

            match future::select(feed, timer).await {
                Either::Left((next, _)) => {
                    if next.is_terminal() {
                        // The consumer retired, leaving the signal unconsumed
                        Consumer::Finished(next, signal)
                    } else {
                        fail_step(next, timeout)
                    }
                }

                Either::Right((_, late_feed)) => {
                    // The in-flight feed is discarded; a late result must never surface
                    mem::drop(late_feed);

                    debug!("consumer missed its readiness deadline");
                    Consumer::Failed(StreamError::ReadinessTimeout, signal)
                }
            }
        })
    })
}

///
/// Drops signals that the inner consumer is not ready to accept in time
///
/// The complement of `FailIfNotReady`: a sluggish consumer degrades delivery
/// instead of failing the stream. A busy flag tracks an outstanding readiness
/// check; while it is set, incoming signals are discarded without even
/// checking. Dropped signals are by-design data loss, not an error.
///
pub struct DropIfNotReady {
    timeout: Duration,
}

impl DropIfNotReady {
    ///
    /// Creates an adapter that allows the inner consumer the given duration to
    /// become ready for each signal
    ///
    pub fn new(timeout: Duration) -> DropIfNotReady {
        DropIfNotReady {
            timeout: timeout
        }
    }
}

impl<E: 'static+Send+Clone> Transformer<E, E> for DropIfNotReady {
    fn apply<A: 'static+Send>(self, inner: Consumer<E, A>) -> Consumer<E, Consumer<E, A>> {
        drop_step(future::ready(inner).boxed(), false, self.timeout)
    }
}

fn drop_step<E, A>(pending: BoxFuture<'static, Consumer<E, A>>, busy: bool, timeout: Duration) -> Consumer<E, Consumer<E, A>>
where   E: 'static+Send+Clone,
        A: 'static+Send {
    Consumer::active_async(move |signal| {
        Box::pin(async move {
            if signal.is_end_of_stream() {
                // Completion returns the inner consumer as it stands, without feeding it the end of the stream
                return Consumer::Finished(Consumer::flatten(pending), Signal::EndOfStream);
            }

            if busy {
                // A readiness check is still outstanding; the busy flag is never
                // cleared once a deadline has been missed
                trace!("dropping signal while the consumer is busy");
                return drop_step(pending, true, timeout);
            }

            let timer = Box::pin(tokio::time::sleep(timeout));

            match future::select(pending, timer).await {
                Either::Left((inner, _)) => {
                    if inner.is_terminal() {
                        // The consumer retired on its own, leaving the signal unconsumed
                        Consumer::Finished(inner, signal)
                    } else {
                        drop_step(inner.feed(signal), false, timeout)
                    }
                }

                Either::Right((_, still_pending)) => {
                    // Not ready in time: the signal is lost, and that is not an error
                    trace!("dropping signal after the readiness deadline");
                    drop_step(still_pending, true, timeout)
                }
            }
        })
    })
}
