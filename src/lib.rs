pub mod catalog;
pub mod config;
pub mod error;
pub mod ident;
pub mod metastore;
pub mod server;
pub mod wire;

pub use catalog::Catalog;
pub use config::{CatalogConfig, InitStrategy};
pub use error::{AppError, AppResult};

// Test-only printing helper: expands to eprintln! in tests and debug builds.
// Usage: tprintln!("debug: {}", value);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In release builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        // Preserve formatting checks in release without producing code
        if false { let _ = format!($($arg)*); }
    });
}
