use core::fmt::Display;

use tracing::error;

/// Logs `error` then panics with it.
pub fn report_and_panic<Err: Display>(error: Err, message: &str) -> ! {
    error!("{message}: {error}");

    panic!("{message}: {error}");
}

/// Logs `error` and carries on.
pub fn report<Err: Display>(error: Err, message: &str) {
    error!("{message}: {error}");
}

/// Failures that can't be propagated, e.g. from `main` or the event loop callbacks.
pub trait Failure<T> {
    fn report_and_panic(self, message: &str) -> T;

    /// Logs the failure, the value is dropped.
    fn report(self, message: &str) -> Option<T>;
}

impl<T, E: Display> Failure<T> for Result<T, E> {
    fn report_and_panic(self, message: &str) -> T {
        self.unwrap_or_else(|error| report_and_panic(error, message))
    }

    fn report(self, message: &str) -> Option<T> {
        self.map_err(|error| report(error, message)).ok()
    }
}

impl<T> Failure<T> for Option<T> {
    fn report_and_panic(self, message: &str) -> T {
        self.unwrap_or_else(|| report_and_panic("Was None", message))
    }

    fn report(self, message: &str) -> Self {
        if self.is_none() {
            report("Was None", message);
        }

        self
    }
}
