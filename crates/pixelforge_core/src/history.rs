/// Maximum number of archived versions kept per artifact.
pub const HISTORY_LIMIT: usize = 5;

/// Appends `entry` and evicts the oldest entries beyond [`HISTORY_LIMIT`].
///
/// Evicted snapshots still reference their assets; nothing is deleted.
pub fn archive<T>(mut history: Vec<T>, entry: T) -> Vec<T> {
    history.push(entry);
    if history.len() > HISTORY_LIMIT {
        let excess = history.len() - HISTORY_LIMIT;
        history.drain(..excess);
    }
    history
}
