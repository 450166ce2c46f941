//! Human-readable reports: one `<path> | <status>` line per file, aligned.

use dotsync_core::{AddOutcome, ItemDiff, RemoveOutcome, SyncOutcome, SyncStatus, WipeOutcome};

/// Align rows on the ` | ` separator.
pub fn columns(rows: &[(String, String)]) -> String {
    let width = rows.iter().map(|(left, _)| left.chars().count()).max().unwrap_or(0);
    rows.iter()
        .map(|(left, right)| format!("{:<width$} | {}\n", left, right, width = width))
        .collect()
}

/// Dotfiles read better with a leading `./` when listed relative to home.
fn display_path(home_rel: &str) -> String {
    format!("./{}", home_rel)
}

pub fn status_report(diffs: &[ItemDiff]) -> String {
    let rows: Vec<_> = diffs
        .iter()
        .map(|d| (display_path(&d.home_rel_path), d.status.to_string()))
        .collect();
    columns(&rows)
}

pub fn sync_report(outcome: &SyncOutcome) -> String {
    if outcome.nothing_to_do() {
        return "nothing to do\n".to_string();
    }
    // Pushes first, matching the order they are applied
    let mut rows = Vec::new();
    for wanted in [SyncStatus::LocalNewer, SyncStatus::RemoteNewer, SyncStatus::LocalMissing] {
        for diff in outcome.diffs.iter().filter(|d| d.status == wanted) {
            let action = match diff.status {
                SyncStatus::LocalNewer => "pushed",
                _ => "pulled",
            };
            rows.push((display_path(&diff.home_rel_path), action.to_string()));
        }
    }
    columns(&rows)
}

pub fn add_report(outcome: &AddOutcome) -> String {
    let rows: Vec<_> = outcome
        .added
        .iter()
        .map(|p| (display_path(p), "added".to_string()))
        .chain(
            outcome
                .already_tracked
                .iter()
                .map(|p| (display_path(p), "already tracked".to_string())),
        )
        .collect();
    columns(&rows)
}

pub fn remove_report(outcome: &RemoveOutcome) -> String {
    let rows: Vec<_> = outcome
        .results
        .iter()
        .map(|r| match r.matches {
            0 => (display_path(&r.path), "not tracked".to_string()),
            1 => (display_path(&r.path), "removed".to_string()),
            n => (
                format!("{} ({} instances)", display_path(&r.path), n),
                "removed".to_string(),
            ),
        })
        .collect();
    columns(&rows)
}

pub fn wipe_report(outcome: &WipeOutcome) -> String {
    format!("removed {} notes and {} tags\n", outcome.notes, outcome.tags)
}
