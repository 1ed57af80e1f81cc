use super::consumer::*;
use super::error::*;
use super::producer::*;
use super::signal::*;

use futures::future;
use futures::future::{BoxFuture, FutureExt};
use futures::channel::oneshot;
use smallvec::*;
use tracing::{debug, trace};

use std::mem;
use std::sync::*;

///
/// How a distribution was permanently closed
///
#[derive(Clone, Debug, PartialEq)]
pub (crate) enum Outcome {
    /// Closed normally: waiting consumers resolve with their current state
    Completed,

    /// Closed with an error that is reported to every waiting and future attach
    Failed(StreamError),
}

///
/// An event delivered to a waiting consumer
///
pub (crate) enum WaiterEvent<E> {
    /// The next signal pushed through the distribution
    Feed(Signal<E>),

    /// The distribution was permanently closed
    Settle(Outcome),
}

///
/// A type-erased attached consumer paired with its one-shot result slot
///
/// Handling a `Feed` event may suspend (the consumer's continuation is
/// asynchronous) and yields the waiter's replacement, or `None` once the
/// consumer retired. `Settle` events are handled eagerly, before the returned
/// future is polled, so a settled waiter can simply be dropped.
///
pub (crate) struct Waiter<E> {
    handle: Box<dyn FnOnce(WaiterEvent<E>) -> BoxFuture<'static, Option<Waiter<E>>>+Send>,
}

impl<E> Waiter<E> {
    ///
    /// Wraps an event handler as a waiter
    ///
    pub (crate) fn new<THandle>(handle: THandle) -> Waiter<E>
    where THandle: 'static+Send+FnOnce(WaiterEvent<E>) -> BoxFuture<'static, Option<Waiter<E>>> {
        Waiter {
            handle: Box::new(handle)
        }
    }

    ///
    /// Delivers one event to this waiter, consuming it
    ///
    pub (crate) fn handle(self, event: WaiterEvent<E>) -> BoxFuture<'static, Option<Waiter<E>>> {
        (self.handle)(event)
    }
}

///
/// The shared coordination state behind a broadcast distribution
///
/// The waiter list holds every attached consumer awaiting its next signal, in
/// attach order; the redemption flag records a permanent close exactly once.
/// Both are only touched while the lock is held, and every effect (feeding a
/// consumer, resolving a result slot) happens after the lock is released.
///
pub (crate) struct RelayCore<E> {
    /// Consumers waiting for the next signal
    pub waiters: Vec<Waiter<E>>,

    /// Set when the distribution is permanently closed; never changes afterwards
    pub redeemed: Option<Outcome>,
}

impl<E> RelayCore<E> {
    pub fn new() -> RelayCore<E> {
        RelayCore {
            waiters:    vec![],
            redeemed:   None,
        }
    }
}

///
/// Builds the type-erased waiter for one attached consumer
///
/// The waiter owns the consumer and the sending side of its result slot: when
/// the consumer turns terminal (or the distribution settles) the slot is
/// resolved and the waiter retires, otherwise it hands back a replacement
/// wrapping the next continuation. The slot sender is consumed on resolution,
/// so a slot can never be written twice.
///
pub (crate) fn make_waiter<E, A>(consumer: Consumer<E, A>, slot: oneshot::Sender<Result<Consumer<E, A>, StreamError>>) -> Waiter<E>
where   E: 'static+Send,
        A: 'static+Send {
    Waiter::new(move |event| {
        match event {
            WaiterEvent::Settle(Outcome::Completed) => {
                // A graceful close resolves with the consumer as it stands (no EndOfStream is delivered)
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
                            let next = continuation.feed(signal).await;

                            if next.is_terminal() {
                                // A failure here resolves only this consumer's slot
                                slot.send(Ok(next)).ok();
                                None
                            } else {
                                Some(make_waiter(next, slot))
                            }
                        })
                    }

                    // Terminal consumers resolve immediately and are dropped
                    terminal => {
                        slot.send(Ok(terminal)).ok();
                        future::ready(None).boxed()
                    }
                }
            }
        }
    })
}

///
/// Attaches a consumer to a relay core, returning its deferred final state
///
/// If the core has already been redeemed the attach resolves immediately with
/// the recorded outcome instead of being queued.
///
pub (crate) fn attach<E, A>(core: &Arc<Mutex<RelayCore<E>>>, consumer: Consumer<E, A>) -> Attach<E, A>
where   E: 'static+Send,
        A: 'static+Send {
    let (slot, result) = oneshot::channel();

    // The redemption check and the enqueue must be a single atomic step so a
    // racing close can never leave a waiter stranded in the list
    let immediate = {
        let mut core = core.lock().unwrap();

        match core.redeemed.clone() {
            Some(outcome)   => Some((consumer, outcome)),
            None            => {
                core.waiters.push(make_waiter(consumer, slot));
                None
            }
        }
    };

    match immediate {
        Some((consumer, Outcome::Completed)) => {
            trace!("attach after redemption, resolving immediately");
            future::ready(Ok(consumer)).boxed()
        }

        Some((_, Outcome::Failed(error))) => {
            trace!("attach after failed redemption, resolving immediately");
            future::ready(Err(error)).boxed()
        }

        None => {
            Box::pin(async move {
                match result.await {
                    Ok(resolved)            => resolved,
                    Err(oneshot::Canceled)  => Err(StreamError::Aborted("distribution dropped before the consumer finished".to_string())),
                }
            })
        }
    }
}

///
/// Delivers one signal to every consumer currently in the waiter list
///
/// The list is atomically swapped to empty so this step owns every current
/// waiter; each one is then fed independently, and the survivors are merged
/// back in ahead of any consumers that attached while the step was running
/// (those only see subsequent signals). Returns true if the list transitioned
/// from non-empty to empty.
///
pub (crate) fn relay<E>(core: &Arc<Mutex<RelayCore<E>>>, signal: Signal<E>) -> BoxFuture<'static, bool>
where E: 'static+Send+Clone {
    let core = Arc::clone(core);

    Box::pin(async move {
        let drained = {
            let mut core = core.lock().unwrap();
            mem::take(&mut core.waiters)
        };

        if drained.is_empty() {
            return false;
        }

        // Feed every drained waiter; each feed is independently asynchronous and
        // the step as a whole waits for all of them
        let feeds = drained.into_iter()
            .map(|waiter| waiter.handle(WaiterEvent::Feed(signal.clone())))
            .collect::<SmallVec<[_; 8]>>();

        let survivors = future::join_all(feeds).await
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();

        // A close may have landed while the feeds were running, in which case the
        // survivors settle instead of re-queueing into a redeemed core
        let (stranded, is_empty) = {
            let mut core = core.lock().unwrap();

            match core.redeemed.clone() {
                Some(outcome)   => (Some((survivors, outcome)), true),
                None            => {
                    // Merge the survivors back ahead of anything attached during the step
                    let attached_during_step = mem::take(&mut core.waiters);

                    core.waiters = survivors;
                    core.waiters.extend(attached_during_step);

                    (None, core.waiters.is_empty())
                }
            }
        };

        if let Some((survivors, outcome)) = stranded {
            for waiter in survivors {
                let _ = waiter.handle(WaiterEvent::Settle(outcome.clone()));
            }
        }

        is_empty
    })
}

///
/// Permanently closes a relay core with the given outcome
///
/// The outcome is recorded exactly once: the first call resolves every waiting
/// consumer's slot, and later calls are no-ops.
///
pub (crate) fn settle<E>(core: &Arc<Mutex<RelayCore<E>>>, outcome: Outcome) {
    let drained = {
        let mut core = core.lock().unwrap();

        if core.redeemed.is_some() {
            // Already redeemed: the recorded outcome never changes
            None
        } else {
            core.redeemed = Some(outcome.clone());
            Some(mem::take(&mut core.waiters))
        }
    };

    if let Some(drained) = drained {
        debug!(waiters = drained.len(), "distribution redeemed");

        // Settle events are handled eagerly, so resolving the slots happens here,
        // outside of the lock
        for waiter in drained {
            let _ = waiter.handle(WaiterEvent::Settle(outcome.clone()));
        }
    }
}
