use super::consumer::*;

///
/// A transformer adapts an inner consumer into an outer consumer, usually to
/// decouple the two sides of a stream (buffering, flow control, re-chunking)
///
/// The outer consumer's result is the inner consumer in whatever state the
/// transformer last observed it, so the caller can keep feeding it or extract
/// its result with `run`.
///
pub trait Transformer<In, Out> {
    ///
    /// Wraps an inner consumer, producing the adapted outer consumer
    ///
    fn apply<A: 'static+Send>(self, inner: Consumer<Out, A>) -> Consumer<In, Consumer<Out, A>>;
}
