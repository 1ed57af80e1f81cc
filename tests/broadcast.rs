extern crate futures;
extern crate push_stream;
extern crate tokio;

use push_stream::*;

use futures::executor;
use futures::channel::oneshot;

#[test]
fn broadcast_to_one_consumer() {
    let (distributor, channel) = broadcast::<i32>();

    executor::block_on(async {
        let result = distributor.apply(Consumer::collect());

        channel.push_item(1).await;
        channel.push_item(2).await;
        channel.push(Signal::EndOfStream).await;

        match result.await.unwrap() {
            Consumer::Finished(collected, leftover) => {
                assert!(collected == vec![1, 2]);
                assert!(leftover == Signal::EndOfStream);
            }

            _ => assert!(false),
        }
    })
}

#[test]
fn broadcast_to_two_consumers() {
    let (distributor, channel) = broadcast::<i32>();

    executor::block_on(async {
        let sums    = distributor.apply(Consumer::fold(0, |accumulator, item| accumulator + item));
        let collects = distributor.apply(Consumer::collect());

        channel.push_item(1).await;
        channel.push_item(2).await;
        channel.push_item(3).await;
        channel.push(Signal::EndOfStream).await;

        assert!(sums.await.unwrap().run().await == Ok(6));
        assert!(collects.await.unwrap().run().await == Ok(vec![1, 2, 3]));
    })
}

#[test]
fn signals_before_attach_are_discarded() {
    let (distributor, channel) = broadcast::<i32>();

    executor::block_on(async {
        // Nobody is attached yet, so this goes nowhere
        channel.push_item(1).await;

        let result = distributor.apply(Consumer::collect());

        channel.push_item(2).await;
        channel.push(Signal::EndOfStream).await;

        assert!(result.await.unwrap().run().await == Ok(vec![2]));
    })
}

#[test]
fn end_leaves_the_consumer_active() {
    let (distributor, channel) = broadcast::<i32>();

    executor::block_on(async {
        let result = distributor.apply(Consumer::fold(0, |accumulator, item| accumulator + item));

        channel.push_item(1).await;
        channel.end();

        // No end-of-stream was delivered, so the consumer resolves as it stands
        let consumer = result.await.unwrap();
        assert!(!consumer.is_terminal());
        assert!(consumer.run().await == Ok(1));
    })
}

#[test]
fn end_is_idempotent() {
    let (distributor, channel) = broadcast::<i32>();

    executor::block_on(async {
        let result = distributor.apply(Consumer::<i32, Vec<i32>>::collect());

        channel.end();
        channel.end_with_error(StreamError::Aborted("too late".to_string()));

        // The first close wins: the consumer resolved successfully
        assert!(result.await.unwrap().run().await == Ok(vec![]));
    })
}

#[test]
fn end_with_error_reports_the_error() {
    let (distributor, channel) = broadcast::<i32>();

    executor::block_on(async {
        let result = distributor.apply(Consumer::<i32, Vec<i32>>::collect());

        channel.end_with_error(StreamError::Aborted("boom".to_string()));

        match result.await {
            Err(StreamError::Aborted(message))  => assert!(message == "boom"),
            _                                   => assert!(false),
        }
    })
}

#[test]
fn attach_after_end_resolves_immediately() {
    let (distributor, channel) = broadcast::<i32>();

    executor::block_on(async {
        channel.end();

        let result = distributor.apply(Consumer::<i32, Vec<i32>>::collect());
        assert!(result.await.unwrap().run().await == Ok(vec![]));
    })
}

#[test]
fn attach_after_end_with_error_resolves_with_the_error() {
    let (distributor, channel) = broadcast::<i32>();

    executor::block_on(async {
        channel.end_with_error(StreamError::Aborted("closed".to_string()));

        let result = distributor.apply(Consumer::<i32, Vec<i32>>::collect());

        match result.await {
            Err(StreamError::Aborted(message))  => assert!(message == "closed"),
            _                                   => assert!(false),
        }
    })
}

#[test]
fn one_failing_consumer_does_not_disturb_the_others() {
    let (distributor, channel) = broadcast::<i32>();

    executor::block_on(async {
        let failing: Consumer<i32, i32> = Consumer::active(|signal| Consumer::Failed(StreamError::Aborted("broken".to_string()), signal));

        let failing_result  = distributor.apply(failing);
        let collect_result  = distributor.apply(Consumer::collect());

        channel.push_item(1).await;

        // The failure resolves only the failing consumer's deferred result
        match failing_result.await.unwrap() {
            Consumer::Failed(error, leftover) => {
                assert!(error == StreamError::Aborted("broken".to_string()));
                assert!(leftover == Signal::Element(1));
            }

            _ => assert!(false),
        }

        channel.push_item(2).await;
        channel.push(Signal::EndOfStream).await;

        assert!(collect_result.await.unwrap().run().await == Ok(vec![1, 2]));
    })
}

#[tokio::test]
async fn end_during_a_feed_still_resolves_the_consumer() {
    let (distributor, channel) = broadcast::<i32>();

    let (release, gate) = oneshot::channel::<()>();

    // Accepts its first signal only once the gate opens, then collects promptly
    let gated: Consumer<i32, Vec<i32>> = Consumer::active_async(move |signal| {
        Box::pin(async move {
            gate.await.ok();
            Consumer::collect().feed(signal).await
        })
    });

    let result = distributor.apply(gated);

    let push = tokio::spawn({
        let channel = channel.clone();
        async move { channel.push_item(1).await; }
    });
    tokio::task::yield_now().await;

    // The close lands while the consumer is suspended mid-feed
    channel.end();

    release.send(()).ok();
    push.await.unwrap();

    // The consumer survived the feed and the close resolves it, still active
    let consumer = result.await.unwrap();
    assert!(!consumer.is_terminal());
    assert!(consumer.run().await == Ok(vec![1]));
}

#[test]
fn push_end_of_stream_then_end_terminates_the_consumers() {
    let (distributor, channel) = broadcast::<i32>();

    executor::block_on(async {
        let result = distributor.apply(Consumer::collect());

        channel.push_item(1).await;
        channel.push_end_of_stream_then_end().await;

        match result.await.unwrap() {
            Consumer::Finished(collected, leftover) => {
                assert!(collected == vec![1]);
                assert!(leftover == Signal::EndOfStream);
            }

            _ => assert!(false),
        }

        // The channel is closed as well, so a late attach resolves immediately
        let late = distributor.apply(Consumer::<i32, Vec<i32>>::collect());
        assert!(late.await.unwrap().run().await == Ok(vec![]));
    })
}
