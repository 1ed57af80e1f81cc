use super::consumer::*;
use super::error::*;
use super::producer::*;
use super::relay_core::{Waiter, WaiterEvent, make_waiter};
use super::signal::*;

use futures::future;
use futures::future::{FutureExt};
use futures::channel::oneshot;
use tracing::{debug, trace};

use std::mem;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Callback handed the panel handle when the consumer attaches
type OnStart<E> = Box<dyn FnOnce(PatchPanel<E>)+Send>;

struct PanelCore<E> {
    /// The persistent consumer's current continuation, taken while a feed is in
    /// flight (the async lock is held across the feed, serialising producers)
    feeder: tokio::sync::Mutex<Option<Waiter<E>>>,

    /// Bumped by every patch; signals from older generations are refused
    generation: AtomicU64,

    /// Set once the persistent consumer has retired
    closed: AtomicBool,
}

///
/// Feeds one long-lived consumer from a replaceable sequence of producers
///
/// Attaching the consumer hands a `PatchPanel` handle to the `on_start`
/// callback; each `patch_in` unplugs the previous producer and plugs in a new
/// one, without the consumer ever observing the swap. The panel closes when
/// the consumer reaches a terminal state.
///
pub struct PatchPanelProducer<E> {
    on_start: Mutex<Option<OnStart<E>>>,
}

///
/// Creates a patch panel producer
///
/// `on_start` receives the handle used to patch producers in once a consumer
/// has attached.
///
pub fn patch_panel<E, TStart>(on_start: TStart) -> PatchPanelProducer<E>
where TStart: 'static+Send+FnOnce(PatchPanel<E>) {
    PatchPanelProducer {
        on_start: Mutex::new(Some(Box::new(on_start)))
    }
}

impl<E: 'static+Send> Producer<E> for PatchPanelProducer<E> {
    fn apply<A: 'static+Send>(&self, consumer: Consumer<E, A>) -> Attach<E, A> {
        let on_start = self.on_start.lock().unwrap().take();

        let on_start = match on_start {
            Some(on_start)  => on_start,
            None            => { return future::ready(Err(StreamError::Aborted("patch panel is already attached".to_string()))).boxed(); }
        };

        let (slot, result) = oneshot::channel();

        let core = Arc::new(PanelCore {
            feeder:     tokio::sync::Mutex::new(Some(make_waiter(consumer, slot))),
            generation: AtomicU64::new(0),
            closed:     AtomicBool::new(false),
        });

        on_start(PatchPanel { core: core });

        Box::pin(async move {
            match result.await {
                Ok(resolved)            => resolved,
                Err(oneshot::Canceled)  => Err(StreamError::Aborted("patch panel dropped before the consumer finished".to_string())),
            }
        })
    }
}

///
/// The handle used to swap producers in and out of a patch panel
///
pub struct PatchPanel<E> {
    core: Arc<PanelCore<E>>,
}

impl<E> Clone for PatchPanel<E> {
    fn clone(&self) -> PatchPanel<E> {
        PatchPanel {
            core: Arc::clone(&self.core)
        }
    }
}

impl<E: 'static+Send> PatchPanel<E> {
    ///
    /// Plugs a producer into the panel, unplugging whatever was patched in
    /// before it
    ///
    /// The new producer is driven on a spawned task, so this must be called
    /// from within a tokio runtime. The previous producer is released at its
    /// next signal; signals it has in flight never reach the consumer after
    /// the swap. Returns false (without starting the producer) once the panel
    /// has closed.
    ///
    pub fn patch_in<TProducer>(&self, producer: TProducer) -> bool
    where TProducer: 'static+Producer<E> {
        if self.core.closed.load(Ordering::SeqCst) {
            return false;
        }

        let generation  = self.core.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let core        = Arc::clone(&self.core);

        debug!(generation = generation, "patching in a new producer");

        tokio::spawn(async move {
            let _ = producer.apply(panel_consumer(core, generation)).await;
        });

        true
    }

    ///
    /// True once the persistent consumer has retired (no further producer can
    /// be patched in)
    ///
    pub fn closed(&self) -> bool {
        self.core.closed.load(Ordering::SeqCst)
    }
}

///
/// The consumer handed to each patched-in producer: forwards signals to the
/// persistent consumer for as long as its generation is the current one
///
fn panel_consumer<E: 'static+Send>(core: Arc<PanelCore<E>>, generation: u64) -> Consumer<E, ()> {
    Consumer::active_async(move |signal| {
        Box::pin(async move {
            if core.closed.load(Ordering::SeqCst) || core.generation.load(Ordering::SeqCst) != generation {
                trace!(generation = generation, "unplugged producer released");
                return Consumer::Finished((), signal);
            }

            let mut feeder_slot = core.feeder.lock().await;

            // A swap may have happened while this signal waited for the feed lock
            if core.closed.load(Ordering::SeqCst) || core.generation.load(Ordering::SeqCst) != generation {
                trace!(generation = generation, "unplugged producer released");
                return Consumer::Finished((), signal);
            }

            let feeder = match feeder_slot.take() {
                Some(feeder)    => feeder,
                None            => {
                    core.closed.store(true, Ordering::SeqCst);
                    return Consumer::Finished((), signal);
                }
            };

            match feeder.handle(WaiterEvent::Feed(signal)).await {
                Some(next) => {
                    *feeder_slot = Some(next);
                    mem::drop(feeder_slot);

                    panel_consumer(core, generation)
                }

                None => {
                    // The persistent consumer retired; its result slot has already resolved
                    core.closed.store(true, Ordering::SeqCst);
                    Consumer::Finished((), Signal::NoData)
                }
            }
        })
    })
}
