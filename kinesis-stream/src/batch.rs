/// Splits `items` into consecutive batches holding at most `max_records` entries and at most
/// `max_bytes` as measured by `size_of`. Order is preserved within and across batches.
///
/// An item larger than `max_bytes` on its own still gets a batch of its own. The publisher screens
/// records against the per-record limit first, so with a sane config this never reaches the wire.
pub(crate) fn partition<T>(
    items: Vec<T>,
    max_records: usize,
    max_bytes: usize,
    size_of: impl Fn(&T) -> usize,
) -> Vec<Vec<T>> {
    let max_records = max_records.max(1);
    let mut batches = Vec::new();
    let mut current: Vec<T> = Vec::new();
    let mut current_bytes = 0usize;

    for item in items {
        let size = size_of(&item);
        let over_count = current.len() >= max_records;
        let over_bytes = !current.is_empty() && current_bytes + size > max_bytes;
        if over_count || over_bytes {
            batches.push(std::mem::take(&mut current));
            current_bytes = 0;
        }
        current_bytes += size;
        current.push(item);
    }

    if !current.is_empty() {
        batches.push(current);
    }
    batches
}
