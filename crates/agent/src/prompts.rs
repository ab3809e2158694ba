use rust_decimal::Decimal;

use ratedesk_core::{IntakeField, Phase};

pub const HELLO: &str = "Hi! I'm your Mortgage Rate Negotiator. Let's start with a few intake questions: salary, assets, first-time buyer (yes/no), and number of cars.";
pub const INTAKE_COMPLETE: &str = "Thank you for the information. We need your consent for background and credit checks. Do you consent to a background check?";
pub const CONSENT_BG_NEXT: &str = "Background check passed (mock). Next: credit check?";
pub const CONSENT_CREDIT_READY: &str =
    "Soft credit check passed (mock score 742). Calculating rate...";
pub const ACCEPT_FINAL: &str = "Finalizing with Notary Agent. Sending final report...";
pub const NOTARY_DONE: &str = "Notary complete (mock). Final report generated (stub).";

const INTAKE_EXAMPLE: &str = "\"My salary is $75,000, I have $50,000 in assets, I am a first-time buyer, and I have 1 car.\"";

/// `6.50` renders as `6.5`, `6.62` as `6.62`.
pub fn format_apr(apr: Decimal) -> String {
    apr.normalize().to_string()
}

pub fn rate_report(baseline: Decimal, offered: Decimal) -> String {
    format!(
        "Baseline 30yr: {}%. Offered APR: {}%. Proceed to negotiation?",
        format_apr(baseline),
        format_apr(offered)
    )
}

pub fn counter_offer(offered: Decimal) -> String {
    format!("New offer: {}% APR with loyalty discount.", format_apr(offered))
}

pub fn missing_fields(missing: &[IntakeField]) -> String {
    if missing.is_empty() {
        return HELLO.to_string();
    }
    let labels = missing.iter().map(IntakeField::label).collect::<Vec<_>>().join(", ");
    format!(
        "I still need some information. Please provide your: {labels}. \
         For example: {INTAKE_EXAMPLE}"
    )
}

pub fn phase_default(phase: Phase) -> &'static str {
    match phase {
        Phase::Intake => HELLO,
        Phase::AwaitingConsentBg => "Do you consent to a background check?",
        Phase::BgDone => "Do you consent to a credit check?",
        Phase::CreditDone | Phase::RateReady => "Would you like to see your rate offer?",
        Phase::Negotiating => "Would you like to negotiate further or accept the current offer?",
        Phase::Notary | Phase::Final => "How can I help you with your mortgage application?",
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use ratedesk_core::{IntakeField, Phase};

    use super::{counter_offer, format_apr, missing_fields, phase_default, rate_report, HELLO};

    #[test]
    fn apr_formatting_drops_trailing_zeros() {
        assert_eq!(format_apr(Decimal::new(650, 2)), "6.5");
        assert_eq!(format_apr(Decimal::new(662, 2)), "6.62");
        assert_eq!(format_apr(Decimal::new(700, 2)), "7");
    }

    #[test]
    fn rate_report_wording() {
        assert_eq!(
            rate_report(Decimal::new(68, 1), Decimal::new(662, 2)),
            "Baseline 30yr: 6.8%. Offered APR: 6.62%. Proceed to negotiation?"
        );
        assert_eq!(
            counter_offer(Decimal::new(659, 2)),
            "New offer: 6.59% APR with loyalty discount."
        );
    }

    #[test]
    fn missing_field_prompt_lists_labels_in_order() {
        let prompt =
            missing_fields(&[IntakeField::Assets, IntakeField::FirstTimeBuyer, IntakeField::Cars]);
        assert_eq!(
            prompt,
            "I still need some information. Please provide your: assets/house value, first-time buyer status, number of cars. For example: \"My salary is $75,000, I have $50,000 in assets, I am a first-time buyer, and I have 1 car.\""
        );
        assert_eq!(missing_fields(&[]), HELLO);
    }

    #[test]
    fn every_phase_has_a_default_prompt() {
        for phase in Phase::ALL {
            assert!(!phase_default(phase).is_empty());
        }
        assert_eq!(phase_default(Phase::CreditDone), phase_default(Phase::RateReady));
        assert_eq!(phase_default(Phase::Intake), HELLO);
    }
}
