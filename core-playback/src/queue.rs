//! Queue utilities.
//!
//! The queue is a plain ordered `Vec<Track>`; these helpers keep ids unique
//! and resolve neighbours relative to the current track.

use crate::types::Track;
use std::collections::HashSet;

/// Build the queue for a load request.
///
/// - `None` or an empty queue becomes `[track]`.
/// - Duplicate ids are collapsed, the first occurrence wins.
/// - `track` is prepended when the supplied queue does not contain it.
pub fn build_queue(track: &Track, queue: Option<Vec<Track>>) -> Vec<Track> {
    let mut seen = HashSet::new();
    let mut tracks: Vec<Track> = queue
        .unwrap_or_default()
        .into_iter()
        .filter(|candidate| seen.insert(candidate.id.clone()))
        .collect();

    if !seen.contains(&track.id) {
        tracks.insert(0, track.clone());
    }
    tracks
}

pub fn index_of(queue: &[Track], id: &str) -> Option<usize> {
    queue.iter().position(|track| track.id == id)
}

/// Index following `id`. Wraps to the first entry when `wrap` is set.
///
/// `None` when `id` is not in the queue or the queue is exhausted.
pub fn next_index(queue: &[Track], id: &str, wrap: bool) -> Option<usize> {
    let index = index_of(queue, id)?;
    if index + 1 < queue.len() {
        Some(index + 1)
    } else if wrap && queue.len() > 1 {
        Some(0)
    } else {
        None
    }
}

/// Index preceding `id`. Wraps to the last entry when `wrap` is set.
pub fn previous_index(queue: &[Track], id: &str, wrap: bool) -> Option<usize> {
    let index = index_of(queue, id)?;
    if index > 0 {
        Some(index - 1)
    } else if wrap && queue.len() > 1 {
        Some(queue.len() - 1)
    } else {
        None
    }
}
