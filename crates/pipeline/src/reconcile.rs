//! Merging batch verdicts back into an ordered detail list.

use sitewatch_core::annotation::AnnotationDetail;
use sitewatch_vision::BatchVerdict;

/// Apply `verdicts` to `details` by index.
///
/// Each verdict overwrites the validation flag of the detail at its
/// index, and its violation name when one was given. Indices past the end
/// of the list are ignored. Details without a verdict are left untouched.
/// Returns the number of verdicts applied.
pub fn reconcile(details: &mut [AnnotationDetail], verdicts: &[BatchVerdict]) -> usize {
    let mut applied = 0;

    for verdict in verdicts {
        let Some(detail) = details.get_mut(verdict.detail_index) else {
            tracing::warn!(
                detail_index = verdict.detail_index,
                details = details.len(),
                "Verdict for unknown detail index, ignoring",
            );
            continue;
        };

        detail.is_valid = Some(verdict.is_valid);
        if let Some(name) = &verdict.violation_name {
            detail.violation_name.clone_from(name);
        }
        applied += 1;
    }

    applied
}
