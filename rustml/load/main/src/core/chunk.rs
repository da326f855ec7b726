//! Fixed-size chunking.

/// Split `items` into consecutive batches of `size`; the last may be shorter.
/// A size of 0 is treated as 1.
pub fn batches<T>(items: &[T], size: usize) -> std::slice::Chunks<'_, T> {
    items.chunks(size.max(1))
}
