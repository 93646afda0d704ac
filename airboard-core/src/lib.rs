//! airboard-core: nearest-airport resolution and departures feed state.
//!
//! No async, no network. This crate holds the algorithms; `airboard-server`
//! drives them with a runtime, a data source and a lifecycle.

pub mod config;
pub mod directory;
pub mod feed;
pub mod flight;
pub mod geo;
pub mod resolver;
pub mod types;

// Re-export commonly used types at crate root
pub use directory::AirportDirectory;
pub use feed::{Clock, Completion, Feed, FeedSettings, FeedSnapshot, FetchRequest, SystemClock};
pub use flight::{FlightRecord, FlightStatus};
pub use resolver::{resolve, Resolution, Resolver, ResolverSettings};
pub use types::*;
