//! Safeguards — business-policy overrides applied after the policy picks an
//! action. Rules are evaluated in order and the first match wins. Every rule
//! moves the decision into `consider`, and no rule fires on `consider`, so
//! applying the layer twice changes nothing.

use serde::{Deserialize, Serialize};

use crate::decision::config::SafeguardThresholds;
use crate::decision::models::{Action, FeatureVector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SafeguardRule {
    /// Strong technical signal must not be auto-rejected.
    ExceptionalTechnical,
    /// Well-rounded candidates deserve a human look before rejection.
    WellRoundedProfile,
    /// Very weak communication blocks an automatic hire.
    CommunicationFloor,
    /// Very weak culture fit blocks an automatic hire.
    CultureVeto,
}

impl SafeguardRule {
    pub fn as_str(self) -> &'static str {
        match self {
            SafeguardRule::ExceptionalTechnical => "exceptional-technical",
            SafeguardRule::WellRoundedProfile => "well-rounded-profile",
            SafeguardRule::CommunicationFloor => "communication-floor",
            SafeguardRule::CultureVeto => "culture-veto",
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            SafeguardRule::ExceptionalTechnical => "strong technical score overrides rejection",
            SafeguardRule::WellRoundedProfile => "well-rounded profile overrides rejection",
            SafeguardRule::CommunicationFloor => "communication below floor blocks hire",
            SafeguardRule::CultureVeto => "culture fit below floor blocks hire",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafeguardOverride {
    pub rule: SafeguardRule,
    pub from: Action,
    pub to: Action,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct Safeguards {
    thresholds: SafeguardThresholds,
}

impl Safeguards {
    pub fn new(thresholds: SafeguardThresholds) -> Self {
        Self { thresholds }
    }

    /// Returns the rule that applies to `action`, if any.
    pub fn check(&self, features: &FeatureVector, action: Action) -> Option<(SafeguardRule, f64)> {
        let t = self.thresholds;
        match action {
            Action::Reject => {
                if features.technical > t.technical_override {
                    return Some((SafeguardRule::ExceptionalTechnical, 0.60));
                }
                let well_rounded = features.technical >= t.well_rounded_floor
                    && features.communication >= t.well_rounded_floor
                    && features.culture_fit >= t.well_rounded_floor;
                if well_rounded {
                    return Some((SafeguardRule::WellRoundedProfile, 0.55));
                }
                None
            }
            Action::Hire => {
                if features.communication < t.communication_floor {
                    return Some((SafeguardRule::CommunicationFloor, 0.50));
                }
                if features.culture_fit < t.culture_floor {
                    return Some((SafeguardRule::CultureVeto, 0.50));
                }
                None
            }
            Action::Consider => None,
        }
    }

    pub fn apply(
        &self,
        features: &FeatureVector,
        action: Action,
        confidence: f64,
    ) -> (Action, f64, Option<SafeguardOverride>) {
        match self.check(features, action) {
            Some((rule, forced)) => {
                let applied = SafeguardOverride {
                    rule,
                    from: action,
                    to: Action::Consider,
                    confidence: forced,
                };
                (Action::Consider, forced, Some(applied))
            }
            None => (action, confidence, None),
        }
    }
}
