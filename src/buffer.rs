use super::consumer::*;
use super::error::*;
use super::signal::*;
use super::transformer::*;

use futures::future;
use futures::future::{BoxFuture, FutureExt};
use futures::channel::oneshot;
use tracing::debug;

use std::collections::{VecDeque};
use std::mem;
use std::sync::*;

/// Measures how much buffer capacity a signal occupies
type SizeOf<E> = Arc<dyn Fn(&Signal<E>) -> usize+Send+Sync>;

///
/// Decouples the rate at which signals arrive from the rate at which an inner
/// consumer consumes them, bounding memory with a maximum capacity
///
/// This is useful when the producing side holds an expensive resource (an open
/// cursor, say) and wants to push data as fast as it is available, while a slow
/// consumer (a network sink, say) drains asynchronously. Signals queue while
/// the occupied capacity has not gone past `max_capacity`: a buffer exactly at
/// capacity still accepts one more data signal, and the first data signal after
/// that fails the stream with a buffer overflow rather than queueing without
/// bound. `EndOfStream` is always accepted regardless of capacity, so
/// termination is never dropped.
///
pub struct BoundedBuffer<E> {
    /// The most capacity the queue may occupy before further data overflows
    max_capacity: usize,

    /// Measures each queued signal
    size_of: SizeOf<E>,
}

impl<E: 'static+Send> BoundedBuffer<E> {
    ///
    /// Creates a bounded buffer where every signal before the end of the stream
    /// occupies one unit of capacity
    ///
    pub fn new(max_capacity: usize) -> BoundedBuffer<E> {
        Self::with_size_of(max_capacity, |_| 1)
    }

    ///
    /// Creates a bounded buffer with a custom measure of how much capacity each
    /// signal occupies
    ///
    pub fn with_size_of<TSizeOf>(max_capacity: usize, size_of: TSizeOf) -> BoundedBuffer<E>
    where TSizeOf: 'static+Send+Sync+Fn(&Signal<E>) -> usize {
        BoundedBuffer {
            max_capacity:   max_capacity,
            size_of:        Arc::new(size_of),
        }
    }
}

impl<E: 'static+Send> Transformer<E, E> for BoundedBuffer<E> {
    ///
    /// Wraps an inner consumer with the buffer
    ///
    /// This spawns the background draining task, so it must be called from
    /// within a tokio runtime.
    ///
    fn apply<A: 'static+Send>(self, inner: Consumer<E, A>) -> Consumer<E, Consumer<E, A>> {
        let state           = Arc::new(Mutex::new(BufferState::Queueing(VecDeque::new(), 0)));
        let (done, when_done) = oneshot::channel();

        tokio::spawn(drain(Arc::clone(&state), self.size_of.clone(), inner, done));

        outer_step(state, self.max_capacity, self.size_of, when_done)
    }
}

///
/// What the buffer is doing right now; exactly one of these holds at any instant
///
enum BufferState<E, A> {
    /// Signals queued ahead of the draining task, with the occupied capacity
    /// (the occupied size only counts queued data signals, never `EndOfStream`)
    Queueing(VecDeque<Signal<E>>, usize),

    /// The draining task is suspended waiting for the next signal
    Waiting(oneshot::Sender<Signal<E>>),

    /// The inner consumer reached its final state (taken by the outer consumer)
    Finished(Option<Consumer<E, A>>),
}

/// What happened to a signal pushed into the buffer
enum Pushed<E, A> {
    /// Queued (or handed straight to the draining task); keep accepting
    Queued,

    /// The end of the stream went in; wait for the drain and finish
    AtEnd,

    /// The inner consumer already finished; the signal was dropped
    Retired(Option<Consumer<E, A>>),

    /// The buffer was full, the signal is rejected
    Overflowed(Signal<E>),
}

///
/// The outer consumer fed by the producing side of the buffer
///
fn outer_step<E, A>(state: Arc<Mutex<BufferState<E, A>>>, max_capacity: usize, size_of: SizeOf<E>, when_done: oneshot::Receiver<()>) -> Consumer<E, Consumer<E, A>>
where   E: 'static+Send,
        A: 'static+Send {
    Consumer::active_async(move |signal| {
        Box::pin(async move {
            let ends = signal.is_end_of_stream();

            let pushed = {
                let mut locked = state.lock().unwrap();

                match &mut *locked {
                    BufferState::Finished(final_state) => Pushed::Retired(final_state.take()),

                    BufferState::Waiting(_) => {
                        // Hand the signal straight to the suspended draining task, bypassing the queue
                        if let BufferState::Waiting(slot) = mem::replace(&mut *locked, BufferState::Queueing(VecDeque::new(), 0)) {
                            slot.send(signal).ok();
                        }

                        if ends { Pushed::AtEnd } else { Pushed::Queued }
                    }

                    BufferState::Queueing(queue, occupied) => {
                        if ends {
                            // Termination bypasses the capacity check unconditionally
                            queue.push_back(signal);
                            Pushed::AtEnd
                        } else if *occupied <= max_capacity {
                            *occupied += (size_of)(&signal);
                            queue.push_back(signal);
                            Pushed::Queued
                        } else {
                            debug!(occupied = *occupied, max_capacity = max_capacity, "buffer overflow");

                            // The downstream still gets told to terminate
                            *locked = BufferState::Queueing(VecDeque::from(vec![Signal::EndOfStream]), 0);
                            Pushed::Overflowed(signal)
                        }
                    }
                }
            };

            match pushed {
                Pushed::Queued              => outer_step(state, max_capacity, size_of, when_done),
                Pushed::Overflowed(signal)  => Consumer::Failed(StreamError::BufferOverflow, signal),

                Pushed::Retired(Some(inner))    => Consumer::Finished(inner, Signal::NoData),
                Pushed::Retired(None)           => Consumer::Failed(StreamError::Aborted("buffer already retired".to_string()), Signal::NoData),

                Pushed::AtEnd => {
                    // Wait for the draining task to feed everything through
                    when_done.await.ok();

                    let final_state = {
                        match &mut *state.lock().unwrap() {
                            BufferState::Finished(final_state)  => final_state.take(),
                            _                                   => None,
                        }
                    };

                    match final_state {
                        Some(inner) => Consumer::Finished(inner, Signal::EndOfStream),
                        None        => Consumer::Failed(StreamError::Aborted("buffer drain ended without a final state".to_string()), Signal::EndOfStream),
                    }
                }
            }
        })
    })
}

///
/// The draining task: repeatedly takes the oldest queued signal (suspending
/// while the queue is empty) and feeds it to the inner consumer
///
/// Retires once the inner consumer turns terminal or the end of the stream has
/// been fed, recording the final state for the outer consumer.
///
async fn drain<E, A>(state: Arc<Mutex<BufferState<E, A>>>, size_of: SizeOf<E>, inner: Consumer<E, A>, done: oneshot::Sender<()>)
where   E: 'static+Send,
        A: 'static+Send {
    let mut inner = inner;

    loop {
        let signal  = next_signal(&state, &size_of).await;
        let ends    = signal.is_end_of_stream();

        inner = inner.feed(signal).await;

        if inner.is_terminal() || ends {
            break;
        }
    }

    // Record the final state and wake the outer consumer if it reached the end
    { *state.lock().unwrap() = BufferState::Finished(Some(inner)); }
    done.send(()).ok();
}

///
/// Resolves with the next signal for the draining task
///
fn next_signal<E, A>(state: &Arc<Mutex<BufferState<E, A>>>, size_of: &SizeOf<E>) -> BoxFuture<'static, Signal<E>>
where   E: 'static+Send,
        A: 'static+Send {
    let mut locked = state.lock().unwrap();

    match &mut *locked {
        BufferState::Queueing(queue, occupied) => {
            if let Some(signal) = queue.pop_front() {
                if !signal.is_end_of_stream() {
                    *occupied = occupied.saturating_sub((size_of)(&signal));
                }

                future::ready(signal).boxed()
            } else {
                // Queue is empty: suspend until the producing side hands a signal over
                let (slot, next) = oneshot::channel();
                *locked = BufferState::Waiting(slot);

                Box::pin(async move {
                    match next.await {
                        Ok(signal)              => signal,
                        // The outer consumer was dropped without ending the stream
                        Err(oneshot::Canceled)  => Signal::EndOfStream,
                    }
                })
            }
        }

        // The drain is the only task that installs a waiting slot, so any other
        // state here means the buffer is shutting down
        _ => future::ready(Signal::EndOfStream).boxed(),
    }
}
