use crate::{filter, group_with_labels};
use canvas_protocol::{FlatRecord, Group, Labels, ProjectionState};
use log::debug;

/// Filter by the state's query, then group by its category.
pub fn project(records: &[FlatRecord], state: &ProjectionState, labels: &Labels) -> Vec<Group> {
    let matched = filter(records, &state.query);
    let matched_len = matched.len();
    let groups = group_with_labels(matched, state.category, labels);
    debug!(
        "projected {} of {} records into {} {} groups",
        matched_len,
        records.len(),
        groups.len(),
        state.category
    );
    groups
}
