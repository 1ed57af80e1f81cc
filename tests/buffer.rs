extern crate futures;
extern crate push_stream;
extern crate tokio;

use push_stream::*;

use futures::future;
use futures::channel::oneshot;

#[tokio::test]
async fn buffer_drains_everything_to_the_inner_consumer() {
    let buffer  = BoundedBuffer::new(4);
    let outer   = buffer.apply(Consumer::<i32, Vec<i32>>::collect());

    let outer = outer.feed(Signal::Element(1)).await;
    let outer = outer.feed(Signal::Element(2)).await;
    let outer = outer.feed(Signal::EndOfStream).await;

    match outer {
        Consumer::Finished(inner, leftover) => {
            assert!(leftover == Signal::EndOfStream);
            assert!(inner.run().await == Ok(vec![1, 2]));
        }

        _ => assert!(false),
    }
}

#[tokio::test]
async fn full_buffer_overflows() {
    let buffer              = BoundedBuffer::new(2);
    let stuck: Consumer<i32, i32> = Consumer::active_async(|_| Box::pin(future::pending()));

    let mut outer = buffer.apply(stuck);

    // The draining task takes the first signal and never finishes with it
    outer = outer.feed(Signal::Element(1)).await;
    tokio::task::yield_now().await;

    for item in 2..5 {
        outer = outer.feed(Signal::Element(item)).await;
        assert!(!outer.is_terminal());
    }

    let outer = outer.feed(Signal::Element(5)).await;

    match outer {
        Consumer::Failed(error, leftover) => {
            assert!(error == StreamError::BufferOverflow);
            assert!(leftover == Signal::Element(5));
        }

        _ => assert!(false),
    }
}

#[tokio::test]
async fn end_of_stream_is_accepted_on_a_full_buffer() {
    let (release, gate) = oneshot::channel::<()>();

    // Accepts its first signal only once the gate opens, then collects promptly
    let gated: Consumer<i32, Vec<i32>> = Consumer::active_async(move |signal| {
        Box::pin(async move {
            gate.await.ok();
            Consumer::collect().feed(signal).await
        })
    });

    let buffer      = BoundedBuffer::new(2);
    let mut outer   = buffer.apply(gated);

    outer = outer.feed(Signal::Element(1)).await;
    tokio::task::yield_now().await;

    // These fill the queue behind the blocked drain
    outer = outer.feed(Signal::Element(2)).await;
    outer = outer.feed(Signal::Element(3)).await;

    release.send(()).ok();

    let outer = outer.feed(Signal::EndOfStream).await;

    match outer {
        Consumer::Finished(inner, leftover) => {
            assert!(leftover == Signal::EndOfStream);
            assert!(inner.run().await == Ok(vec![1, 2, 3]));
        }

        _ => assert!(false),
    }
}

#[tokio::test]
async fn early_finish_retires_the_buffer() {
    // Finishes with the first element it sees
    let first: Consumer<i32, i32> = Consumer::active(|signal| {
        match signal {
            Signal::Element(item)   => Consumer::Finished(item, Signal::NoData),
            other                   => Consumer::Finished(0, other),
        }
    });

    let buffer      = BoundedBuffer::new(4);
    let mut outer   = buffer.apply(first);

    outer = outer.feed(Signal::Element(42)).await;
    tokio::task::yield_now().await;

    // The inner consumer already finished, later signals are dropped
    let outer = outer.feed(Signal::Element(43)).await;

    match outer {
        Consumer::Finished(inner, leftover) => {
            assert!(leftover == Signal::NoData);
            assert!(inner.run().await == Ok(42));
        }

        _ => assert!(false),
    }
}

#[tokio::test]
async fn custom_sizes_count_against_the_capacity() {
    let stuck: Consumer<i32, i32> = Consumer::active_async(|_| Box::pin(future::pending()));

    // Each element occupies capacity equal to its value
    let buffer = BoundedBuffer::with_size_of(3, |signal: &Signal<i32>| {
        match signal {
            Signal::Element(item)   => *item as usize,
            _                       => 0,
        }
    });

    let mut outer = buffer.apply(stuck);

    outer = outer.feed(Signal::Element(2)).await;
    tokio::task::yield_now().await;

    outer = outer.feed(Signal::Element(2)).await;
    outer = outer.feed(Signal::Element(2)).await;
    assert!(!outer.is_terminal());

    // Occupied capacity is past the maximum now
    let outer = outer.feed(Signal::Element(2)).await;

    match outer {
        Consumer::Failed(error, _)  => assert!(error == StreamError::BufferOverflow),
        _                           => assert!(false),
    }
}
