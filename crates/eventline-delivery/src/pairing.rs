//! Task log pruning

use eventline_core::Event;

/// Drop delivered events, always keeping the last one
///
/// The last event stays so the next run can pair its first new event with it.
/// A list of zero or one elements is returned unchanged.
pub fn prune(events: Vec<Event>) -> Vec<Event> {
    if events.len() <= 1 {
        return events;
    }

    let last = events.len() - 1;
    events
        .into_iter()
        .enumerate()
        .filter(|(i, event)| *i == last || !event.is_sent())
        .map(|(_, event)| event)
        .collect()
}
