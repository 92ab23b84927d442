//! Reconciliation of optimistic local state with the authoritative
//! `complete` payload.
//!
//! The caller may already be rendering state assumed at submit time. When
//! the authoritative report arrives, server attributes override matching
//! local ones, but locally known values absent (or empty) in the server
//! payload are preserved. Visible content must never regress: a populated
//! `html` is never replaced by an empty one.

use super::FinalReport;

/// Merge an authoritative incoming report against whatever report already
/// exists for the session. Most-recent-source-wins per field, with
/// non-emptiness validated before an inbound field is applied.
pub fn merge_final(existing: Option<&FinalReport>, incoming: FinalReport) -> FinalReport {
    let Some(existing) = existing else {
        return incoming;
    };

    let html = if incoming.html.trim().is_empty() && !existing.html.trim().is_empty() {
        existing.html.clone()
    } else {
        incoming.html
    };

    let correlation_id = if incoming.correlation_id.is_empty() {
        existing.correlation_id.clone()
    } else {
        incoming.correlation_id
    };

    let mut payload = existing.payload.clone();
    for (key, value) in incoming.payload {
        if value.is_null() {
            continue;
        }
        // An empty string never overwrites a populated one.
        if let Some(s) = value.as_str() {
            if s.is_empty() {
                let kept = payload
                    .get(&key)
                    .and_then(|v| v.as_str())
                    .map(|v| !v.is_empty())
                    .unwrap_or(false);
                if kept {
                    continue;
                }
            }
        }
        payload.insert(key, value);
    }

    FinalReport {
        html,
        correlation_id,
        payload,
    }
}
