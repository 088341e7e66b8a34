use crate::model::DomMutationRecord;

/// Orders mutations by (timestamp, event index), the order they were applied in.
pub fn sort_dom_changes(records: &mut [DomMutationRecord]) {
    records.sort_by_key(DomMutationRecord::sort_key);
}
