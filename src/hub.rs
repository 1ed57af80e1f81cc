use super::consumer::*;
use super::producer::*;
use super::relay_core::*;
use super::signal::*;

use futures::future::{BoxFuture, FutureExt};
use tracing::debug;

use std::sync::*;
use std::sync::atomic::{AtomicBool, Ordering};

/// Callback fired whenever the hub's attached-consumer list drains to empty
type OnIdle = Arc<dyn Fn()+Send+Sync>;

///
/// Shares one underlying producer between any number of consumers
///
/// The source producer is started at most once, lazily, when the first consumer
/// attaches; every signal it emits is fanned out to whoever is attached at that
/// moment. Consumers that attach later only see later signals.
///
pub struct HubProducer<E> {
    core: Arc<HubCore<E>>,
}

struct HubCore<E> {
    /// Fan-out state shared with the consumer that drives the source
    relay: Arc<Mutex<RelayCore<E>>>,

    /// Set once the first attach has claimed the driver
    started: AtomicBool,

    /// The task that drives the source producer, until the first attach takes it
    driver: Mutex<Option<BoxFuture<'static, ()>>>,
}

///
/// The control handle for a hub: observes and interrupts the shared fan-out
///
pub struct Broadcaster {
    no_cords:   Arc<dyn Fn() -> bool+Send+Sync>,
    closed:     Arc<AtomicBool>,
}

impl Broadcaster {
    ///
    /// True when no consumer is currently attached to the hub
    ///
    pub fn no_cords(&self) -> bool {
        (self.no_cords)()
    }

    ///
    /// Interrupts the hub: the shared producer is released at its next signal
    /// and any remaining consumers resolve with their current state
    ///
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    ///
    /// True once the hub has been closed
    ///
    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl<E: 'static+Send+Clone> Producer<E> for HubProducer<E> {
    fn apply<A: 'static+Send>(&self, consumer: Consumer<E, A>) -> Attach<E, A> {
        // Join the fan-out before starting the source, so the first consumer
        // cannot miss the signals it triggered
        let result = attach(&self.core.relay, consumer);

        if !self.core.started.swap(true, Ordering::SeqCst) {
            if let Some(driver) = self.core.driver.lock().unwrap().take() {
                debug!("starting the shared producer");
                tokio::spawn(driver);
            }
        }

        result
    }
}

///
/// Shares the supplied producer between many consumers, returning the hub and
/// its control handle
///
/// `on_idle` fires whenever delivering a signal leaves the hub with no attached
/// consumers (every consumer retired during that signal). The source producer
/// is not started until the first consumer attaches; this start spawns a
/// driving task, so the first attach must happen within a tokio runtime.
///
pub fn multicast_over<E, TProducer, TIdle>(source: TProducer, on_idle: TIdle) -> (HubProducer<E>, Broadcaster)
where   E:          'static+Send+Clone,
        TProducer:  'static+Producer<E>,
        TIdle:      'static+Send+Sync+Fn() {
    let relay   = Arc::new(Mutex::new(RelayCore::new()));
    let closed  = Arc::new(AtomicBool::new(false));
    let on_idle = Arc::new(on_idle);

    let driver = {
        let relay   = Arc::clone(&relay);
        let closed  = Arc::clone(&closed);

        async move {
            let fan_out = relay_consumer(Arc::clone(&relay), Arc::clone(&closed), on_idle);

            // The source is done with the fan-out consumer: whoever is still
            // attached resolves now
            match source.apply(fan_out).await {
                Ok(_)       => settle(&relay, Outcome::Completed),
                Err(error)  => settle(&relay, Outcome::Failed(error)),
            }
        }.boxed()
    };

    let core = Arc::new(HubCore {
        relay:      Arc::clone(&relay),
        started:    AtomicBool::new(false),
        driver:     Mutex::new(Some(driver)),
    });

    let broadcaster = Broadcaster {
        no_cords:   Arc::new(move || relay.lock().unwrap().waiters.is_empty()),
        closed:     closed,
    };

    (HubProducer { core: core }, broadcaster)
}

///
/// The consumer attached to the hub's source: fans every signal out to the
/// attached consumers, finishing at the end of the stream or once the hub is
/// closed
///
fn relay_consumer<E>(core: Arc<Mutex<RelayCore<E>>>, closed: Arc<AtomicBool>, on_idle: OnIdle) -> Consumer<E, ()>
where E: 'static+Send+Clone {
    Consumer::active_async(move |signal| {
        Box::pin(async move {
            if closed.load(Ordering::SeqCst) {
                // Closed between signals: release the source without delivering
                return Consumer::Finished((), signal);
            }

            let ends        = signal.is_end_of_stream();
            let became_idle = relay(&core, signal).await;

            if became_idle {
                on_idle();
            }

            if ends || closed.load(Ordering::SeqCst) {
                Consumer::Finished((), Signal::NoData)
            } else {
                relay_consumer(core, closed, on_idle)
            }
        })
    })
}
