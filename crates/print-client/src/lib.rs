//! Print Client
//!
//! Talks to the local print service and falls back to the desktop's own
//! print path when the service is down.

pub mod client;
pub mod fallback;
pub mod native;

pub use client::{ClientError, PrintServiceClient, DEFAULT_BASE_URL};
pub use fallback::{FallbackController, FallbackError, PrintMethod, PrintOutcome};
pub use native::{NativeError, NativePrinter, SystemViewerPrinter};
