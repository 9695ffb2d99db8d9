//! Reconciliation of stored client identity with the current request

use super::state::{old_key, SessionState, KEY_IP, KEY_PROXY};
use crate::types::NetworkIdentity;
use tracing::debug;

/// Merges the current request's network identity into stored session state.
///
/// The primary key always ends up holding the latest observed value. When it
/// changes, the previous value is kept under `<attr>_old`.
pub struct MetadataReconciler;

impl MetadataReconciler {
    /// Merge `current` into `stored`, returning the reconciled state
    pub fn merge(mut stored: SessionState, current: &NetworkIdentity) -> SessionState {
        Self::merge_attr(&mut stored, KEY_PROXY, &current.proxy);
        Self::merge_attr(&mut stored, KEY_IP, &current.ip);
        stored
    }

    fn merge_attr(state: &mut SessionState, key: &str, current: &str) {
        match state.get(key) {
            Some(serde_json::Value::String(s)) if s == current => return,
            Some(previous) => {
                debug!(attr = key, from = %previous, to = current, "Client identity changed");
                let previous = previous.clone();
                state.insert_value(old_key(key), previous);
            }
            None => {}
        }
        state.insert_str(key, current);
    }
}
