//! Path batching for executor calls.

/// Split `paths` into consecutive chunks of at most `batch_size` entries.
///
/// A zero `batch_size` is treated as one so the caller always makes progress.
pub fn into_batches<I>(paths: I, batch_size: usize) -> Vec<Vec<String>>
where
    I: IntoIterator<Item = String>,
{
    let batch_size = batch_size.max(1);
    let mut batches = Vec::new();
    let mut current = Vec::with_capacity(batch_size);
    for path in paths {
        current.push(path);
        if current.len() == batch_size {
            batches.push(std::mem::replace(&mut current, Vec::with_capacity(batch_size)));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}
