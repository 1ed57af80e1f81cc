use super::channel::*;
use super::consumer::*;
use super::error::*;
use super::producer::*;
use super::relay_core::{Outcome, Waiter, WaiterEvent};
use super::signal::*;

use futures::future;
use futures::future::{BoxFuture, FutureExt};
use futures::channel::oneshot;
use tracing::trace;

use std::collections::{VecDeque};
use std::mem;
use std::sync::*;

/// Callback fired when the unicast consumer finishes normally
type OnComplete = Arc<dyn Fn()+Send+Sync>;

/// Callback fired when the unicast consumer fails, with the error and leftover signal
type OnError<E> = Arc<dyn Fn(&StreamError, &Signal<E>)+Send+Sync>;

/// Callback handed the channel when the consumer attaches
type OnStart<E> = Box<dyn FnOnce(Channel<E>)+Send>;

///
/// Bridges imperative push semantics to a single pull-based consumer
///
/// Attaching a consumer creates a `Channel` and hands it to the `on_start`
/// callback; every push then feeds the consumer's current continuation.
/// Exactly one of `on_complete`/`on_error` fires when the consumer reaches a
/// terminal state; neither fires for an `end` without any signal consumed.
///
/// At most one consumer can attach; a second attach resolves with an error.
///
pub struct UnicastProducer<E> {
    on_start:       Mutex<Option<OnStart<E>>>,
    on_complete:    OnComplete,
    on_error:       OnError<E>,
}

///
/// Creates a unicast producer
///
/// `on_start` receives the channel that feeds the attached consumer,
/// `on_complete` fires when the consumer finishes, and `on_error` fires when
/// it fails (with the error and the leftover signal).
///
pub fn unicast<E, TStart, TComplete, TError>(on_start: TStart, on_complete: TComplete, on_error: TError) -> UnicastProducer<E>
where   TStart:     'static+Send+FnOnce(Channel<E>),
        TComplete:  'static+Send+Sync+Fn(),
        TError:     'static+Send+Sync+Fn(&StreamError, &Signal<E>) {
    UnicastProducer {
        on_start:       Mutex::new(Some(Box::new(on_start))),
        on_complete:    Arc::new(on_complete),
        on_error:       Arc::new(on_error),
    }
}

impl<E: 'static+Send> Producer<E> for UnicastProducer<E> {
    fn apply<A: 'static+Send>(&self, consumer: Consumer<E, A>) -> Attach<E, A> {
        let on_start = self.on_start.lock().unwrap().take();

        let on_start = match on_start {
            Some(on_start)  => on_start,
            None            => { return future::ready(Err(StreamError::Aborted("unicast producer is already attached".to_string()))).boxed(); }
        };

        let (slot, result)  = oneshot::channel();
        let feeder          = make_feeder(consumer, slot, Arc::clone(&self.on_complete), Arc::clone(&self.on_error));
        let core            = Arc::new(Mutex::new(UnicastState::Idle(feeder)));

        on_start(Channel::from_target(Arc::new(UnicastTarget { core: core })));

        Box::pin(async move {
            match result.await {
                Ok(resolved)            => resolved,
                Err(oneshot::Canceled)  => Err(StreamError::Aborted("unicast channel dropped before the consumer finished".to_string())),
            }
        })
    }
}

/// A signal queued behind an in-flight feed, with the slot that resolves its
/// push future once the signal has been fed
type QueuedSignal<E> = (Signal<E>, oneshot::Sender<()>);

///
/// What the unicast adapter is doing right now
///
enum UnicastState<E> {
    /// The consumer's continuation is ready for the next signal
    Idle(Waiter<E>),

    /// A feed is in flight: later pushes queue behind it, and a close waits for
    /// it (the first requested outcome wins)
    Busy(VecDeque<QueuedSignal<E>>, Option<Outcome>),

    /// The consumer reached a terminal state or the channel was closed
    Done,
}

/// The push target feeding a unicast adapter
struct UnicastTarget<E> {
    core: Arc<Mutex<UnicastState<E>>>,
}

impl<E: 'static+Send> PushTarget<E> for UnicastTarget<E> {
    fn deliver(&self, signal: Signal<E>) -> BoxFuture<'static, ()> {
        // Swap a fresh pending state in, then feed whatever continuation was current
        let run = {
            let mut state = self.core.lock().unwrap();

            match mem::replace(&mut *state, UnicastState::Done) {
                UnicastState::Idle(feeder) => {
                    *state = UnicastState::Busy(VecDeque::new(), None);
                    Run::Feed(feeder, signal)
                }

                UnicastState::Busy(mut queued, pending) => {
                    // A feed is already in flight: this signal queues behind it
                    let (fed, when_fed) = oneshot::channel();

                    queued.push_back((signal, fed));
                    *state = UnicastState::Busy(queued, pending);

                    Run::Wait(when_fed)
                }

                UnicastState::Done => {
                    trace!("push after the unicast adapter finished, ignoring");
                    Run::Nothing
                }
            }
        };

        match run {
            Run::Nothing                => future::ready(()).boxed(),
            Run::Feed(feeder, signal)   => Box::pin(run_feeder(Arc::clone(&self.core), feeder, signal)),

            // Resolved once the queued signal has been fed (or the adapter
            // retired with the signal still queued)
            Run::Wait(when_fed)         => Box::pin(async move { when_fed.await.ok(); }),
        }
    }

    fn settle(&self, outcome: Outcome) {
        let feeder = {
            let mut state = self.core.lock().unwrap();

            match mem::replace(&mut *state, UnicastState::Done) {
                UnicastState::Idle(feeder) => Some(feeder),

                UnicastState::Busy(queued, pending) => {
                    // Settle once the in-flight feed completes; the first close wins
                    *state = UnicastState::Busy(queued, Some(pending.unwrap_or_else(|| outcome.clone())));
                    None
                }

                UnicastState::Done => None,
            }
        };

        // Settle events resolve eagerly, outside of the lock
        if let Some(feeder) = feeder {
            let _ = feeder.handle(WaiterEvent::Settle(outcome));
        }
    }
}

/// What a push turns into once the state transition has been decided
enum Run<E> {
    Feed(Waiter<E>, Signal<E>),
    Wait(oneshot::Receiver<()>),
    Nothing,
}

///
/// Feeds one signal (plus anything queued behind it) through the consumer's
/// continuation, then puts the adapter back to idle or settles it
///
async fn run_feeder<E: 'static+Send>(core: Arc<Mutex<UnicastState<E>>>, feeder: Waiter<E>, signal: Signal<E>) {
    let mut next_feed: Option<(Waiter<E>, Signal<E>, Option<oneshot::Sender<()>>)> = Some((feeder, signal, None));

    while let Some((feeder, signal, fed)) = next_feed.take() {
        let step = feeder.handle(WaiterEvent::Feed(signal)).await;

        // The coordination step for this signal is over, its push can resolve
        if let Some(fed) = fed {
            fed.send(()).ok();
        }

        // Decide the next move under the lock; act after releasing it
        let settle_with = {
            let mut state = core.lock().unwrap();

            match step {
                None => {
                    // The consumer turned terminal; its slot and callbacks have already fired
                    *state = UnicastState::Done;
                    None
                }

                Some(next) => {
                    match mem::replace(&mut *state, UnicastState::Done) {
                        UnicastState::Busy(mut queued, pending) => {
                            if let Some((queued_signal, queued_fed)) = queued.pop_front() {
                                *state      = UnicastState::Busy(queued, pending);
                                next_feed   = Some((next, queued_signal, Some(queued_fed)));
                                None
                            } else if let Some(outcome) = pending {
                                // A close was requested while the feed was in flight
                                Some((next, outcome))
                            } else {
                                *state = UnicastState::Idle(next);
                                None
                            }
                        }

                        // Only one of these loops runs at a time, so the state stays busy while feeding
                        other => {
                            *state = other;
                            None
                        }
                    }
                }
            }
        };

        if let Some((next, outcome)) = settle_with {
            let _ = next.handle(WaiterEvent::Settle(outcome));
            return;
        }
    }
}

///
/// Builds the type-erased feeder for the unicast consumer
///
/// Like a broadcast waiter, but it also fires the completion/error callbacks
/// when the consumer reaches a terminal state. Settling without a signal fires
/// neither callback, since nothing was consumed.
///
fn make_feeder<E, A>(consumer: Consumer<E, A>, slot: oneshot::Sender<Result<Consumer<E, A>, StreamError>>, on_complete: OnComplete, on_error: OnError<E>) -> Waiter<E>
where   E: 'static+Send,
        A: 'static+Send {
    Waiter::new(move |event| {
        match event {
            WaiterEvent::Settle(Outcome::Completed) => {
                // Completion without consumption: the consumer resolves as it stands
                slot.send(Ok(consumer)).ok();
                future::ready(None).boxed()
            }

            WaiterEvent::Settle(Outcome::Failed(error)) => {
                slot.send(Err(error)).ok();
                future::ready(None).boxed()
            }

            WaiterEvent::Feed(signal) => {
                match consumer {
                    Consumer::Active(continuation) => {
                        Box::pin(async move {
                            match continuation.feed(signal).await {
                                Consumer::Finished(result, leftover) => {
                                    on_complete();
                                    slot.send(Ok(Consumer::Finished(result, leftover))).ok();
                                    None
                                }

                                Consumer::Failed(error, leftover) => {
                                    on_error(&error, &leftover);
                                    slot.send(Ok(Consumer::Failed(error, leftover))).ok();
                                    None
                                }

                                next => Some(make_feeder(next, slot, on_complete, on_error)),
                            }
                        })
                    }

                    terminal => {
                        slot.send(Ok(terminal)).ok();
                        future::ready(None).boxed()
                    }
                }
            }
        }
    })
}
