extern crate futures;
extern crate push_stream;

use push_stream::*;

use futures::executor;
use futures::future;
use futures::future::{FutureExt};

#[test]
fn fold_accumulates_elements() {
    executor::block_on(async {
        let sum = Consumer::fold(0, |accumulator, item: i32| accumulator + item);

        let sum = sum.feed(Signal::Element(1)).await;
        let sum = sum.feed(Signal::NoData).await;
        let sum = sum.feed(Signal::Element(2)).await;
        let sum = sum.feed(Signal::EndOfStream).await;

        match sum {
            Consumer::Finished(total, leftover) => {
                assert!(total == 3);
                assert!(leftover == Signal::EndOfStream);
            }

            _ => assert!(false),
        }
    })
}

#[test]
fn run_feeds_the_end_of_the_stream() {
    executor::block_on(async {
        let collect: Consumer<i32, Vec<i32>> = Consumer::collect();
        let collect = collect.feed(Signal::Element(42)).await;

        assert!(collect.run().await == Ok(vec![42]));
    })
}

#[test]
fn run_reports_a_consumer_that_never_finishes() {
    fn forever() -> Consumer<i32, i32> {
        Consumer::active(|_| forever())
    }

    executor::block_on(async {
        match forever().run().await {
            Err(StreamError::Aborted(_))    => { }
            _                               => assert!(false),
        }
    })
}

#[test]
fn terminal_consumers_ignore_signals() {
    executor::block_on(async {
        let finished: Consumer<i32, i32> = Consumer::Finished(7, Signal::NoData);
        let finished = finished.feed(Signal::Element(1)).await;

        match finished {
            Consumer::Finished(result, leftover) => {
                assert!(result == 7);
                assert!(leftover == Signal::NoData);
            }

            _ => assert!(false),
        }
    })
}

#[test]
fn flatten_defers_the_consumer() {
    executor::block_on(async {
        let deferred = future::ready(Consumer::<i32, Vec<i32>>::collect()).boxed();
        let consumer = Consumer::flatten(deferred);

        let consumer = consumer.feed(Signal::Element(5)).await;
        assert!(consumer.run().await == Ok(vec![5]));
    })
}

#[test]
fn signal_producer_replays_its_elements() {
    executor::block_on(async {
        let producer                        = SignalProducer::elements(vec![1, 2, 3]);
        let collect: Consumer<i32, Vec<i32>> = Consumer::collect();

        // The sequence has no end-of-stream, so the consumer is left active
        let after = producer.apply(collect).await.unwrap();
        assert!(!after.is_terminal());

        assert!(after.run().await == Ok(vec![1, 2, 3]));
    })
}

#[test]
fn signal_producer_stops_at_a_terminal_consumer() {
    executor::block_on(async {
        let producer = SignalProducer::signals(vec![Signal::Element(1), Signal::EndOfStream, Signal::Element(2)]);
        let collect: Consumer<i32, Vec<i32>> = Consumer::collect();

        match producer.apply(collect).await.unwrap() {
            Consumer::Finished(collected, leftover) => {
                assert!(collected == vec![1]);
                assert!(leftover == Signal::EndOfStream);
            }

            _ => assert!(false),
        }
    })
}
