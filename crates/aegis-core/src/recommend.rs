//! Follow-up recommendation text for completed responses.

use crate::incident::{IncidentType, SecurityIncident};

/// Produces human-readable follow-up guidance for an incident and its
/// response outcome.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecommendationGenerator;

impl RecommendationGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Guidance for incidents that matched no automated playbook.
    pub fn for_unmatched(&self, incident: &SecurityIncident) -> Vec<String> {
        let mut recs = vec![
            format!(
                "No automated response playbook covers {} incidents at {} severity; manual triage is required.",
                incident.incident_type, incident.severity
            ),
            "Review the incident details and decide on containment steps manually.".to_string(),
        ];
        recs.extend(self.type_guidance(incident.incident_type));
        recs
    }

    /// Guidance for an orchestrated response.
    ///
    /// `actions_failed` and `aborted` shape the outcome-specific items.
    pub fn for_response(
        &self,
        incident: &SecurityIncident,
        actions_failed: usize,
        aborted: bool,
    ) -> Vec<String> {
        let mut recs = self.type_guidance(incident.incident_type);
        if aborted {
            recs.push(
                "A critical containment step failed and the remaining playbook was aborted; escalate to the incident response lead immediately."
                    .to_string(),
            );
        } else if actions_failed > 0 {
            recs.push(format!(
                "{actions_failed} automated action(s) failed; complete the remaining remediation manually and verify containment."
            ));
        }
        recs.push(format!(
            "Confirm the incident status for {} and close it as resolved or false positive.",
            incident.id
        ));
        recs
    }

    fn type_guidance(&self, incident_type: IncidentType) -> Vec<String> {
        match incident_type {
            IncidentType::BruteForce => vec![
                "Force a password reset for targeted accounts.".to_string(),
                "Enable multi-factor authentication where it is not already enforced.".to_string(),
                "Review authentication logs for successful logins from the blocked source.".to_string(),
            ],
            IncidentType::RateLimitAbuse => vec![
                "Review rate limit thresholds for the abused endpoints.".to_string(),
                "Consider longer block durations for repeat offenders.".to_string(),
            ],
            IncidentType::SqlInjection => vec![
                "Audit the targeted endpoint for unparameterized queries.".to_string(),
                "Verify the database user's privileges follow least privilege.".to_string(),
                "Check query logs for data accessed before the block took effect.".to_string(),
            ],
            IncidentType::CrossSiteScripting => vec![
                "Audit output encoding on the targeted endpoint.".to_string(),
                "Review the content security policy for the affected application.".to_string(),
            ],
            IncidentType::DataExfiltration => vec![
                "Review data-loss-prevention coverage for the accessed datasets.".to_string(),
                "Determine the scope of data accessed by the actor before containment.".to_string(),
                "Notify data owners and assess disclosure obligations.".to_string(),
            ],
            IncidentType::PrivilegeEscalation => vec![
                "Audit recent permission grants and role changes for the actor.".to_string(),
                "Review how the escalation path was reachable and close it.".to_string(),
            ],
            IncidentType::SuspiciousActivity => vec![
                "Review the triggering event and surrounding activity manually.".to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::SecurityEvent;
    use crate::incident::{SecurityIncident, Severity};

    fn incident(incident_type: IncidentType) -> SecurityIncident {
        SecurityIncident::from_rule_match(
            "rule-x",
            incident_type,
            Severity::High,
            "test",
            SecurityEvent::new("src", "evt"),
        )
    }

    #[test]
    fn test_unmatched_explains_no_automated_path() {
        let recs = RecommendationGenerator::new().for_unmatched(&incident(IncidentType::BruteForce));
        assert!(recs[0].contains("No automated response playbook"));
        assert!(recs.len() > 2);
    }

    #[test]
    fn test_failure_adds_manual_intervention_notice() {
        let gen = RecommendationGenerator::new();
        let clean = gen.for_response(&incident(IncidentType::SqlInjection), 0, false);
        assert!(!clean.iter().any(|r| r.contains("failed")));

        let failed = gen.for_response(&incident(IncidentType::SqlInjection), 2, false);
        assert!(failed.iter().any(|r| r.contains("2 automated action(s) failed")));
    }

    #[test]
    fn test_abort_adds_escalation_notice() {
        let recs = RecommendationGenerator::new().for_response(
            &incident(IncidentType::DataExfiltration),
            1,
            true,
        );
        assert!(recs.iter().any(|r| r.contains("escalate")));
    }
}
