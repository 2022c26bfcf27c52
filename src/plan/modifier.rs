//! Plan-time prediction of post-apply attribute values.
//!
//! These functions run during planning, before any remote call, and must
//! stay consistent with apply-time behavior: a prediction that disagrees
//! with what apply produces surfaces as an "inconsistent result after
//! apply" failure in the surrounding framework. Both functions are pure
//! and deterministic.

use crate::attr::Attr;

/// Lifecycle state reported for a VM that exited abnormally.
const STATE_CRASHED: &str = "CRASHED";

/// Lifecycle state for a VM that is shut down.
const STATE_STOPPED: &str = "STOPPED";

/// Normalizes a planned enumerated value to the canonical casing already
/// stored in state, so differently-cased-but-equal values produce no diff.
///
/// Applies only when the planned value is known-set and equal to the prior
/// value modulo ASCII case; unknown and null values pass through untouched.
#[must_use]
pub fn normalize_case(prior: &Attr<String>, planned: Attr<String>) -> Attr<String> {
    if planned.eq_ignore_case(prior) {
        prior.clone()
    } else {
        planned
    }
}

/// Predicts the post-apply value of a remote-controlled status field from
/// the stored status and the current/proposed values of its driving
/// desired-state field.
///
/// - No stored status (resource not yet created): no signal, `Unknown`.
/// - Driving value changing between state and plan: the outcome depends on
///   the transition, `Unknown`.
/// - Driving value unchanged but the status has drifted: predict the status
///   converges to the canonical driving value — except a crashed VM with a
///   stopped target, which the appliance considers stopped enough and
///   leaves untouched.
/// - Otherwise: carry the stored status forward.
#[must_use]
pub fn predict_status(
    prior_status: &Attr<String>,
    prior_desired: &Attr<String>,
    planned_desired: &Attr<String>,
) -> Attr<String> {
    let Some(status) = prior_status.as_str() else {
        return Attr::Unknown;
    };

    let (Some(prior), Some(planned)) = (prior_desired.as_str(), planned_desired.as_str()) else {
        return Attr::Unknown;
    };

    let target = planned.to_ascii_uppercase();
    if !prior.eq_ignore_ascii_case(planned) {
        // Desired state is changing; the transition has to happen first.
        return Attr::Unknown;
    }

    if !status.eq_ignore_ascii_case(&target) {
        if status.eq_ignore_ascii_case(STATE_CRASHED) && target == STATE_STOPPED {
            return prior_status.clone();
        }
        return Attr::known(target);
    }

    prior_status.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known(s: &str) -> Attr<String> {
        Attr::known(s.to_string())
    }

    #[test]
    fn test_normalize_case_adopts_prior_casing() {
        let normalized = normalize_case(&known("running"), known("RUNNING"));
        assert_eq!(normalized, known("running"));
    }

    #[test]
    fn test_normalize_case_keeps_real_changes() {
        let normalized = normalize_case(&known("running"), known("stopped"));
        assert_eq!(normalized, known("stopped"));
    }

    #[test]
    fn test_normalize_case_passes_unknown_through() {
        assert_eq!(
            normalize_case(&known("running"), Attr::Unknown),
            Attr::Unknown
        );
        assert_eq!(normalize_case(&Attr::Null, Attr::Null), Attr::Null);
    }

    #[test]
    fn test_predict_unknown_before_first_create() {
        let predicted = predict_status(&Attr::Null, &known("running"), &known("running"));
        assert_eq!(predicted, Attr::Unknown);
    }

    #[test]
    fn test_predict_unknown_when_driving_value_changes() {
        let predicted = predict_status(&known("RUNNING"), &known("running"), &known("stopped"));
        assert_eq!(predicted, Attr::Unknown);
    }

    #[test]
    fn test_predict_drift_converges_to_target() {
        // Desired running on both sides, but the VM is currently stopped:
        // apply will start it.
        let predicted = predict_status(&known("STOPPED"), &known("running"), &known("RUNNING"));
        assert_eq!(predicted, known("RUNNING"));
    }

    #[test]
    fn test_predict_crashed_is_stopped_enough() {
        let predicted = predict_status(&known("CRASHED"), &known("stopped"), &known("stopped"));
        assert_eq!(predicted, known("CRASHED"));
    }

    #[test]
    fn test_predict_no_drift_carries_status_forward() {
        // Only a case difference between status and driving value: no
        // transition happens and the stored casing survives.
        let predicted = predict_status(&known("STOPPED"), &known("stopped"), &known("stopped"));
        assert_eq!(predicted, known("STOPPED"));
    }
}
