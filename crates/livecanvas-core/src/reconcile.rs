//! Bring the canvas in line with the shared document.

use crate::canvas::RenderSurface;
use crate::error::SyncError;
use crate::interaction::InteractionState;
use crate::object::ObjectHandle;
use crate::record::{deserialize, serialize};
use crate::storage::SharedStorage;
use std::collections::HashSet;

/// Objects the reconciler must leave alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Exemptions {
    /// Active object in the middle of a gesture or text edit: not overwritten.
    pub editing: Option<ObjectHandle>,
    /// Object being drawn: not removed although it has no record yet.
    pub drawing: Option<ObjectHandle>,
}

impl Exemptions {
    pub fn from_state(state: &InteractionState) -> Self {
        Self {
            editing: state.selected().filter(|_| state.is_mid_edit()),
            drawing: state.drawing(),
        }
    }
}

/// What a reconcile pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub added: Vec<String>,
    pub updated: Vec<String>,
    pub removed: Vec<ObjectHandle>,
    /// Keys whose records could not be applied.
    pub skipped: Vec<String>,
    /// Keys of exempt objects whose records differ from the canvas.
    pub deferred: Vec<String>,
}

impl ReconcileReport {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.removed.is_empty()
    }
}

/// Applies the shared document to a rendering surface.
pub struct Reconciler;

impl Reconciler {
    /// Add missing objects, update changed ones in place and remove objects
    /// absent from the document. Requests exactly one redraw.
    pub fn reconcile<S, R>(storage: &S, surface: &mut R, exemptions: Exemptions) -> ReconcileReport
    where
        S: SharedStorage + ?Sized,
        R: RenderSurface + ?Sized,
    {
        let mut report = ReconcileReport::default();
        let mut present = HashSet::new();

        for (key, record) in storage.entries() {
            present.insert(key.clone());

            match record.object_id() {
                Some(id) if id == key => {}
                other => {
                    let err = match other {
                        Some(id) => SyncError::KeyMismatch {
                            key: key.clone(),
                            object_id: id.to_string(),
                        },
                        None => SyncError::MissingObjectId,
                    };
                    log::warn!("Skipping record {key}: {err}");
                    report.skipped.push(key);
                    continue;
                }
            }

            let existing = surface.find_by_id(&key);
            if let Some(handle) = existing {
                let unchanged = surface
                    .object(handle)
                    .and_then(|obj| serialize(obj).ok())
                    .is_some_and(|current| current == record);
                if unchanged {
                    continue;
                }
                if exemptions.editing == Some(handle) {
                    report.deferred.push(key);
                    continue;
                }
            }

            let object = match deserialize(&record) {
                Ok(object) => object,
                Err(err) => {
                    log::warn!("Skipping record {key}: {err}");
                    report.skipped.push(key);
                    continue;
                }
            };

            match existing.and_then(|handle| surface.object_mut(handle)) {
                Some(current) => {
                    current.update_from(object);
                    report.updated.push(key);
                }
                None => {
                    surface.add_object(object);
                    report.added.push(key);
                }
            }
        }

        for handle in surface.handles() {
            if exemptions.drawing == Some(handle) {
                continue;
            }
            let keep = surface
                .object(handle)
                .and_then(|obj| obj.id())
                .is_some_and(|id| present.contains(id.as_str()));
            if !keep && surface.remove_object(handle).is_some() {
                report.removed.push(handle);
            }
        }

        surface.request_redraw();
        if !report.is_noop() {
            log::debug!(
                "Reconciled: {} added, {} updated, {} removed, {} skipped",
                report.added.len(),
                report.updated.len(),
                report.removed.len(),
                report.skipped.len()
            );
        }
        report
    }
}
