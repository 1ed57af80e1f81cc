///
/// A single unit of stream traffic
///
/// `NoData` is a placeholder that carries nothing: it's used as a leftover marker
/// when a consumer finishes without any unconsumed input, or to poke a consumer
/// without delivering data. `EndOfStream` marks the permanent termination of the
/// stream.
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Signal<E> {
    /// One chunk of data
    Element(E),

    /// A placeholder that carries no data
    NoData,

    /// The permanent end of the stream
    EndOfStream,
}

impl<E> Signal<E> {
    ///
    /// True if this signal marks the end of the stream
    ///
    #[inline]
    pub fn is_end_of_stream(&self) -> bool {
        match self {
            Signal::EndOfStream => true,
            _                   => false,
        }
    }
}
