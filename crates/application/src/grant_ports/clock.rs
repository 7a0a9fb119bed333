/// Wall clock in epoch milliseconds.
pub trait Clock: Send + Sync {
    /// Returns the current instant in epoch milliseconds.
    fn now_millis(&self) -> i64;
}
