//! Defines core API interfaces used by this crate to access performance counters.

use crate::Result;

/// A generic synchronous access performance counter.
pub trait Counter<V> {
    /// Enable the counter.
    fn enable(&self) -> Result<()>;

    /// Disable the counter.
    fn disable(&self) -> Result<()>;

    /// Reset the counter.
    fn reset(&self) -> Result<()>;

    /// Check if the counter is currently counting.
    fn is_running(&self) -> Result<bool>;

    /// Read the latest value of the counter.
    fn read_sync(&self) -> Result<V>;

    /// Enable the counter around `f` and read the value it accumulated.
    fn measure<F, T>(&self, f: F) -> Result<(T, V)>
    where
        F: FnOnce() -> T,
        Self: Sized,
    {
        self.reset()?;
        self.enable()?;
        let out = f();
        let value = self.read_sync();
        self.disable()?;
        Ok((out, value?))
    }
}
