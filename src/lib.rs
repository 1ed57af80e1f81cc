//!
//! `push_stream` is a crate of coordination utilities for push-driven streams: an imperative
//! producing side (anything that can call a function when data arrives) feeding pull-based,
//! asynchronous consumers.
//!
//! The core vocabulary is small. A `Signal` is what travels: an element, a no-op, or the end
//! of the stream. A `Consumer` is a state machine that accepts signals one at a time until it
//! finishes with a result or fails. A `Producer` drives signals into a consumer and hands back
//! the consumer's deferred final state.
//!
//! ## Broadcasting
//!
//! The most direct way in is `broadcast()`, which pairs a `Channel` (the imperative side) with
//! a `BroadcastDistributor` (the producer side). Any number of consumers can attach to the
//! distributor; every signal pushed into the channel is fanned out to whoever is attached at
//! that moment.
//!
//! ```
//! # extern crate push_stream;
//! # extern crate futures;
//! # use push_stream::*;
//! # use futures::executor;
//! let (distributor, channel) = broadcast::<i32>();
//!
//! executor::block_on(async {
//!     let result = distributor.apply(Consumer::collect());
//!
//!     channel.push_item(1).await;
//!     channel.push_item(2).await;
//!     channel.push(Signal::EndOfStream).await;
//!
//!     let collected = result.await.unwrap().run().await.unwrap();
//!     assert!(collected == vec![1, 2]);
//! });
//! ```
//!
//! ## Adapters
//!
//! On top of that sit the adapters: `BoundedBuffer` decouples a fast producing side from a
//! slow consumer with a capacity-limited queue, `FailIfNotReady` and `DropIfNotReady` put a
//! deadline on a consumer's readiness, `unicast` feeds a single consumer through start,
//! completion and error callbacks, `multicast_over` shares one producer between many
//! consumers, and `patch_panel` feeds one long-lived consumer from a replaceable sequence of
//! producers.

#![warn(bare_trait_objects)]

extern crate futures;
extern crate smallvec;

mod signal;
mod error;
mod consumer;
mod producer;
mod transformer;
mod relay_core;
mod channel;
mod buffer;
mod readiness;
mod unicast;
mod hub;
mod patch_panel;

pub use self::signal::*;
pub use self::error::*;
pub use self::consumer::*;
pub use self::producer::*;
pub use self::transformer::*;
pub use self::channel::*;
pub use self::buffer::*;
pub use self::readiness::*;
pub use self::unicast::*;
pub use self::hub::*;
pub use self::patch_panel::*;
