// src/events/mod.rs
//
// Internal Event System - Public API
//
// Local, synchronous, best-effort notifications. A listener failure is
// logged and never aborts the write that raised the event.

pub mod bus;
pub mod handlers;
pub mod types;

pub use types::DomainEvent;

pub use types::{
    // Watched state
    EpisodeUserDataChanged,
    FileUserDataChanged,
    WatchStateImported,

    // Votes
    EpisodeVoted,
    SeriesVoted,

    // Statistics
    StatisticsScope,
    StatisticsUpdated,
};

pub use bus::{EventBus, EventLogEntry, Subscription};

pub use handlers::register_import_handlers;
