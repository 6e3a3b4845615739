//! Gray-zone routing state machine.
//!
//! Converts the top fused candidate's `final_score` into one of
//! `{direct, gray, reject, no_match}`, then optionally upgrades a `gray`
//! decision to `llm` once the closed-set picker has weighed in.

use fault_fusion::Candidate;
use fault_llm::PickerDecision;

use crate::settings::Thresholds;

/// The router's decision mode. Total: every call to [`decide`] produces
/// exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Direct,
    Gray,
    Reject,
    Llm,
    NoMatch,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Direct => "direct",
            Mode::Gray => "gray",
            Mode::Reject => "reject",
            Mode::Llm => "llm",
            Mode::NoMatch => "no_match",
        }
    }
}

/// Detail of an LLM adjudication, present on a [`Decision`] only once the
/// picker has actually run.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmInfo {
    pub chosen_id: Option<String>,
    pub confidence: f32,
    pub reason: String,
}

/// The router's output.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub mode: Mode,
    pub chosen_id: Option<String>,
    pub confidence: f32,
    pub reason: String,
    pub llm: Option<LlmInfo>,
}

/// Decide a mode from the top candidate's `final_score` and the configured
/// thresholds. Does not invoke the LLM picker; callers in the gray band
/// decide whether to call it and apply [`upgrade_with_llm`] afterward.
pub fn decide(candidates: &[Candidate], thresholds: Thresholds) -> Decision {
    let Some(top) = candidates.first() else {
        return Decision {
            mode: Mode::NoMatch,
            chosen_id: None,
            confidence: 0.0,
            reason: "no candidates".to_string(),
            llm: None,
        };
    };

    let final_score = top.final_score;

    if final_score >= thresholds.pass {
        Decision {
            mode: Mode::Direct,
            chosen_id: Some(top.id.clone()),
            confidence: final_score,
            reason: "high confidence".to_string(),
            llm: None,
        }
    } else if final_score >= thresholds.gray_low {
        Decision {
            mode: Mode::Gray,
            chosen_id: Some(top.id.clone()),
            confidence: final_score,
            reason: "gray band".to_string(),
            llm: None,
        }
    } else {
        Decision {
            mode: Mode::Reject,
            chosen_id: None,
            confidence: final_score,
            reason: "below gray_low".to_string(),
            llm: None,
        }
    }
}

/// Fold an LLM picker result into a `gray` decision.
///
/// If the picker named a concrete id, the decision upgrades to `llm` with
/// `confidence = max(final, llm.confidence)` and `chosen_id` set to the
/// picker's choice. If the picker returned `UNKNOWN`, the decision stays
/// `gray`, keeping the original top candidate as `chosen_id`, with the
/// picker's reason recorded on `llm` for the caller to surface.
///
/// Calling this on a non-`gray` decision returns it unchanged: only the
/// gray band triggers adjudication.
pub fn upgrade_with_llm(decision: Decision, llm: PickerDecision) -> Decision {
    if decision.mode != Mode::Gray {
        return decision;
    }

    match llm.chosen_id.clone() {
        Some(chosen_id) => Decision {
            mode: Mode::Llm,
            chosen_id: Some(chosen_id.clone()),
            confidence: decision.confidence.max(llm.confidence),
            reason: decision.reason,
            llm: Some(LlmInfo { chosen_id: Some(chosen_id), confidence: llm.confidence, reason: llm.reason }),
        },
        None => Decision {
            llm: Some(LlmInfo { chosen_id: None, confidence: llm.confidence, reason: llm.reason }),
            ..decision
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fault_fusion::FaultCase;

    fn candidate(id: &str, final_score: f32) -> Candidate {
        let case = FaultCase {
            id: id.to_string(),
            text: "x".to_string(),
            system: None,
            part: None,
            tags: Vec::new(),
            vehicletype: None,
            faultcode: None,
            popularity: 0.0,
            extra: Default::default(),
        };
        let mut c = Candidate::from_case(&case);
        c.final_score = final_score;
        c
    }

    #[test]
    fn no_candidates_is_no_match() {
        let decision = decide(&[], Thresholds::default());
        assert_eq!(decision.mode, Mode::NoMatch);
        assert_eq!(decision.chosen_id, None);
    }

    #[test]
    fn above_pass_threshold_is_direct() {
        let candidates = vec![candidate("P001", 0.9)];
        let decision = decide(&candidates, Thresholds::default());
        assert_eq!(decision.mode, Mode::Direct);
        assert_eq!(decision.chosen_id, Some("P001".to_string()));
    }

    #[test]
    fn in_gray_band_is_gray() {
        let candidates = vec![candidate("P001", 0.70)];
        let decision = decide(&candidates, Thresholds::default());
        assert_eq!(decision.mode, Mode::Gray);
    }

    #[test]
    fn below_gray_low_is_reject() {
        let candidates = vec![candidate("P001", 0.1)];
        let decision = decide(&candidates, Thresholds::default());
        assert_eq!(decision.mode, Mode::Reject);
        assert_eq!(decision.chosen_id, None);
    }

    #[test]
    fn llm_concrete_pick_upgrades_to_llm_mode() {
        let candidates = vec![candidate("P006", 0.70)];
        let decision = decide(&candidates, Thresholds::default());
        let llm = PickerDecision { chosen_id: Some("P006".to_string()), confidence: 0.72, reason: "更符合异响描述".to_string() };
        let upgraded = upgrade_with_llm(decision, llm);
        assert_eq!(upgraded.mode, Mode::Llm);
        assert_eq!(upgraded.chosen_id, Some("P006".to_string()));
        assert!((upgraded.confidence - 0.72).abs() < 1e-6);
    }

    #[test]
    fn llm_unknown_keeps_gray_with_reason_appended() {
        let candidates = vec![candidate("P006", 0.70)];
        let decision = decide(&candidates, Thresholds::default());
        let llm = PickerDecision { chosen_id: None, confidence: 0.0, reason: "no clear match".to_string() };
        let upgraded = upgrade_with_llm(decision, llm);
        assert_eq!(upgraded.mode, Mode::Gray);
        assert_eq!(upgraded.chosen_id, Some("P006".to_string()));
        assert!(upgraded.llm.is_some());
    }

    #[test]
    fn upgrade_is_a_no_op_outside_gray_mode() {
        let candidates = vec![candidate("P001", 0.9)];
        let decision = decide(&candidates, Thresholds::default());
        let llm = PickerDecision { chosen_id: Some("P001".to_string()), confidence: 0.99, reason: "x".to_string() };
        let upgraded = upgrade_with_llm(decision.clone(), llm);
        assert_eq!(upgraded, decision);
    }
}
