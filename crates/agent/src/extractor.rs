//! Free-text intake extraction.
//!
//! Numeric fields come from an ordered rule table. For each field the rules are tried by
//! ascending priority and the first pattern that matches decides the value. The
//! first-time-buyer flag is delegated to [`crate::first_time_buyer`].

use std::sync::OnceLock;

use regex::Regex;

use ratedesk_core::{IntakeField, IntakeUpdate};

use crate::first_time_buyer;

/// Money amount with optional thousands separators and cents.
const AMOUNT: &str = r"(\d+(?:,\d{3})*(?:\.\d{2})?)";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtractionRule {
    pub field: IntakeField,
    pub priority: u8,
    /// Template with `{N}` standing for the amount capture. Matched case-insensitively.
    pub pattern: &'static str,
}

const fn rule(field: IntakeField, priority: u8, pattern: &'static str) -> ExtractionRule {
    ExtractionRule { field, priority, pattern }
}

pub const EXTRACTION_RULES: &[ExtractionRule] = &[
    rule(IntakeField::Salary, 0, r"salary[:\s]*(?:is\s*)?[\$]?{N}"),
    rule(IntakeField::Salary, 1, r"{N}[:\s]*salary"),
    rule(IntakeField::Salary, 2, r"make[:\s]*[\$]?{N}"),
    rule(IntakeField::Salary, 3, r"earn[:\s]*[\$]?{N}"),
    rule(IntakeField::Assets, 0, r"assets[:\s]*[\$]?{N}"),
    rule(IntakeField::Assets, 1, r"house[:\s]*(?:worth|value)?[:\s]*[\$]?{N}"),
    rule(IntakeField::Assets, 2, r"savings[:\s]*[\$]?{N}"),
    rule(IntakeField::Assets, 3, r"{N}[:\s]*(?:in\s*)?assets"),
    rule(IntakeField::Cars, 0, r"cars?[:\s]*(\d+)"),
    rule(IntakeField::Cars, 1, r"(\d+)[:\s]*cars?"),
    rule(IntakeField::Cars, 2, r"have[:\s]*(\d+)[:\s]*cars?"),
];

struct CompiledRule {
    rule: ExtractionRule,
    regex: Regex,
}

fn compiled_rules() -> &'static [CompiledRule] {
    static RULES: OnceLock<Vec<CompiledRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        let mut compiled = EXTRACTION_RULES
            .iter()
            .filter_map(|rule| {
                let source = format!("(?i){}", rule.pattern.replace("{N}", AMOUNT));
                match Regex::new(&source) {
                    Ok(regex) => Some(CompiledRule { rule: *rule, regex }),
                    Err(error) => {
                        tracing::error!(
                            pattern = rule.pattern,
                            %error,
                            "extraction rule failed to compile"
                        );
                        None
                    }
                }
            })
            .collect::<Vec<_>>();
        compiled.sort_by_key(|compiled| compiled.rule.priority);
        compiled
    })
}

/// First capture of the highest-priority matching rule for `field`.
fn first_capture<'t>(field: IntakeField, text: &'t str) -> Option<&'t str> {
    compiled_rules()
        .iter()
        .filter(|compiled| compiled.rule.field == field)
        .find_map(|compiled| compiled.regex.captures(text))
        .and_then(|captures| captures.get(1))
        .map(|capture| capture.as_str())
}

/// Parses `75,000.00` as `75000`. Overflow yields `None`.
pub fn parse_amount(raw: &str) -> Option<u64> {
    let whole = raw.split('.').next().unwrap_or(raw);
    whole.replace(',', "").parse::<u64>().ok()
}

/// Returns every field the text determines. Pure: the same text always yields the same update.
pub fn extract(text: &str) -> IntakeUpdate {
    let lower = text.to_lowercase();

    let assets = match first_capture(IntakeField::Assets, text) {
        Some(raw) => parse_amount(raw),
        None if lower.contains("house") && lower.contains("no") => Some(0),
        None => None,
    };

    let cars = match first_capture(IntakeField::Cars, text) {
        Some(raw) => raw.parse::<u32>().ok(),
        None if lower.contains("no cars") || (lower.contains("cars") && lower.contains("no")) => {
            Some(0)
        }
        None => None,
    };

    IntakeUpdate {
        salary: first_capture(IntakeField::Salary, text).and_then(parse_amount),
        assets,
        first_time_buyer: first_time_buyer::classify(text),
        cars,
    }
}

#[cfg(test)]
mod tests {
    use ratedesk_core::{Intake, IntakeField, IntakeUpdate};

    use super::{compiled_rules, extract, parse_amount, EXTRACTION_RULES};

    #[test]
    fn every_rule_compiles() {
        assert_eq!(compiled_rules().len(), EXTRACTION_RULES.len());
    }

    #[test]
    fn full_intake_sentence_yields_all_fields() {
        let update = extract(
            "My salary is $75,000, I have $50,000 in assets, I am a first-time buyer, and I have 1 car.",
        );
        assert_eq!(
            update,
            IntakeUpdate {
                salary: Some(75_000),
                assets: Some(50_000),
                first_time_buyer: Some(true),
                cars: Some(1),
            }
        );
    }

    #[test]
    fn salary_alternatives_are_case_insensitive() {
        assert_eq!(extract("SALARY: 120000").salary, Some(120_000));
        assert_eq!(extract("90,000 salary").salary, Some(90_000));
        assert_eq!(extract("I make $85,500.00 a year").salary, Some(85_500));
        assert_eq!(extract("we earn 64000").salary, Some(64_000));
    }

    #[test]
    fn assets_alternatives() {
        assert_eq!(extract("assets: $300,000").assets, Some(300_000));
        assert_eq!(extract("my house worth $450,000").assets, Some(450_000));
        assert_eq!(extract("house value: 200000").assets, Some(200_000));
        assert_eq!(extract("savings 25,000").assets, Some(25_000));
    }

    #[test]
    fn assets_zero_when_no_house_is_mentioned() {
        assert_eq!(extract("I have no house").assets, Some(0));
        assert_eq!(extract("I rent an apartment").assets, None);
    }

    #[test]
    fn cars_alternatives_and_zero_inference() {
        assert_eq!(extract("cars: 2").cars, Some(2));
        assert_eq!(extract("we own 3 cars").cars, Some(3));
        assert_eq!(extract("no cars at all").cars, Some(0));
        assert_eq!(extract("cars? no").cars, Some(0));
        assert_eq!(extract("I take the bus").cars, None);
    }

    #[test]
    fn overflowing_amount_is_omitted() {
        assert_eq!(extract("salary 99999999999999999999999").salary, None);
        assert_eq!(parse_amount("18,446,744,073,709,551,616"), None);
    }

    #[test]
    fn parse_amount_strips_separators_and_cents() {
        assert_eq!(parse_amount("1,234,567.89"), Some(1_234_567));
        assert_eq!(parse_amount("0"), Some(0));
    }

    #[test]
    fn salary_only_message_leaves_three_fields_missing() {
        let intake = Intake::default().merge(&extract("My salary is 80000"));
        assert_eq!(intake.salary, Some(80_000));
        assert_eq!(
            intake.missing_fields(),
            vec![IntakeField::Assets, IntakeField::FirstTimeBuyer, IntakeField::Cars]
        );
    }

    #[test]
    fn merging_the_same_update_twice_is_idempotent() {
        let update = extract("salary 70000, 2 cars");
        let once = Intake::default().merge(&update);
        assert_eq!(once.merge(&update), once);
    }

    #[test]
    fn unrelated_text_extracts_nothing() {
        assert!(extract("Tell me about mortgage options.").is_empty());
    }
}
