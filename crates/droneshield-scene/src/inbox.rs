//! Hand-off point between the snapshot feed and the frame loop
//!
//! The feed client runs outside the ECS (browser callbacks), so it pushes
//! into a shared queue that is drained once per frame. Only the newest
//! snapshot in a drain is kept; earlier ones are superseded.

use bevy::prelude::*;
use droneshield_core::{SnapshotError, WorldSnapshot};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::render_loop::FrameSet;

/// Something the feed client observed
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    Connected,
    Snapshot(WorldSnapshot),
    /// A message arrived but could not be ingested
    Rejected(String),
    Error(String),
    Disconnected(String),
}

/// Shared queue written by the feed client and drained by the frame loop
#[derive(Resource, Clone, Default)]
pub struct SnapshotInbox(Arc<Mutex<Vec<FeedEvent>>>);

impl SnapshotInbox {
    pub fn push(&self, event: FeedEvent) {
        self.queue().push(event);
    }

    pub fn push_snapshot(&self, snapshot: WorldSnapshot) {
        self.push(FeedEvent::Snapshot(snapshot));
    }

    /// Ingest one raw feed message. Unparseable messages are queued as
    /// `Rejected` so the failure shows up in `FeedStatus`.
    pub fn push_json(&self, text: &str) -> Result<(), SnapshotError> {
        match WorldSnapshot::from_json(text) {
            Ok(snapshot) => {
                self.push_snapshot(snapshot);
                Ok(())
            }
            Err(e) => {
                self.push(FeedEvent::Rejected(e.to_string()));
                Err(e)
            }
        }
    }

    pub fn drain(&self) -> Vec<FeedEvent> {
        std::mem::take(&mut *self.queue())
    }

    pub fn len(&self) -> usize {
        self.queue().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A writer that panicked mid-push leaves a valid `Vec`, so the queue
    /// stays usable after poisoning.
    fn queue(&self) -> MutexGuard<'_, Vec<FeedEvent>> {
        self.0.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Snapshot inbox lock was poisoned; recovering");
            poisoned.into_inner()
        })
    }
}

/// Latest snapshot known to the frame loop
#[derive(Resource, Debug, Default)]
pub struct SnapshotState {
    latest: Option<WorldSnapshot>,
    received: u64,
    applied: u64,
}

impl SnapshotState {
    pub fn latest(&self) -> Option<&WorldSnapshot> {
        self.latest.as_ref()
    }

    /// Snapshots accepted so far, including superseded ones
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Whether the latest snapshot has not been reconciled yet
    pub fn has_pending(&self) -> bool {
        self.latest.is_some() && self.applied != self.received
    }

    pub fn accept(&mut self, snapshot: WorldSnapshot) {
        self.latest = Some(snapshot);
        self.received += 1;
    }

    pub fn mark_applied(&mut self) {
        self.applied = self.received;
    }
}

/// Connection health shown by the overlay
#[derive(Resource, Debug, Default, Clone, PartialEq)]
pub struct FeedStatus {
    pub connected: bool,
    pub last_error: Option<String>,
    pub snapshots: u64,
    pub rejected: u64,
}

pub struct InboxPlugin;

impl Plugin for InboxPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<SnapshotInbox>()
            .init_resource::<SnapshotState>()
            .init_resource::<FeedStatus>()
            .add_systems(Update, drain_inbox.in_set(FrameSet::Ingest));
    }
}

fn drain_inbox(
    inbox: Res<SnapshotInbox>,
    mut state: ResMut<SnapshotState>,
    mut status: ResMut<FeedStatus>,
) {
    let mut newest = None;
    for event in inbox.drain() {
        match event {
            FeedEvent::Connected => {
                tracing::info!("Snapshot feed connected");
                status.connected = true;
                status.last_error = None;
            }
            FeedEvent::Snapshot(snapshot) => {
                status.snapshots += 1;
                newest = Some(snapshot);
            }
            FeedEvent::Rejected(reason) => {
                tracing::warn!("Ignoring feed message: {}", reason);
                status.rejected += 1;
                status.last_error = Some(reason);
            }
            FeedEvent::Error(reason) => {
                tracing::error!("Snapshot feed error: {}", reason);
                status.last_error = Some(reason);
            }
            FeedEvent::Disconnected(reason) => {
                tracing::warn!("Snapshot feed disconnected: {}", reason);
                status.connected = false;
                if !reason.is_empty() {
                    status.last_error = Some(reason);
                }
            }
        }
    }

    if let Some(snapshot) = newest {
        state.accept(snapshot);
    }
}
