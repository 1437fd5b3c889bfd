// src/events/handlers/import_handler.rs
//
// Routes watched-state imports raised by remote import jobs into the
// watched-state engine.
//
// CRITICAL RULES:
// - Delegates all logic to UserDataService
// - Tags the change with its import source so it is not synced back
// - Failures are logged, never propagated into the bus

use std::sync::Arc;

use crate::domain::SaveReason;
use crate::events::{EventBus, Subscription, WatchStateImported};
use crate::services::{SetFileWatchedRequest, UserDataService};

/// Subscribe the engine to import events. Dropping the returned
/// subscription detaches it.
pub fn register_import_handlers(bus: &EventBus, service: Arc<UserDataService>) -> Subscription {
    let subscription = bus.subscribe::<WatchStateImported, _>(move |event| {
        handle_watch_state_imported(&service, event);
    });

    log::debug!("Import handlers registered");
    subscription
}

fn handle_watch_state_imported(service: &UserDataService, event: &WatchStateImported) {
    let mut request = SetFileWatchedRequest::new(event.user_id, event.file_id, event.watched)
        .with_reason(SaveReason::Import(event.source.clone()));
    request.watched_at = event.watched_at;

    match service.set_file_watched_state(request) {
        Ok(record) => log::debug!(
            "Imported watched state from {:?}: file={} user={} watched={}",
            event.source,
            record.file_id,
            record.user_id,
            record.is_watched()
        ),
        Err(e) => log::warn!(
            "Failed to import watched state from {:?} for file {}: {}",
            event.source,
            event.file_id,
            e
        ),
    }
}
