use serde::{Deserialize, Serialize};

/// Financial facts collected from the applicant before the mock underwriting checks run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intake {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_time_buyer: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cars: Option<u32>,
}

/// Partial intake produced by extraction. `None` means "not determined", never "clear".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeUpdate {
    pub salary: Option<u64>,
    pub assets: Option<u64>,
    pub first_time_buyer: Option<bool>,
    pub cars: Option<u32>,
}

impl IntakeUpdate {
    pub fn is_empty(&self) -> bool {
        self.salary.is_none()
            && self.assets.is_none()
            && self.first_time_buyer.is_none()
            && self.cars.is_none()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeField {
    Salary,
    Assets,
    FirstTimeBuyer,
    Cars,
}

impl IntakeField {
    pub const ALL: [IntakeField; 4] =
        [IntakeField::Salary, IntakeField::Assets, IntakeField::FirstTimeBuyer, IntakeField::Cars];

    /// Label used when re-prompting the applicant for this field.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Salary => "salary",
            Self::Assets => "assets/house value",
            Self::FirstTimeBuyer => "first-time buyer status",
            Self::Cars => "number of cars",
        }
    }
}

impl Intake {
    /// Overwrites every field the update determined and leaves the rest untouched.
    pub fn merge(&self, update: &IntakeUpdate) -> Intake {
        Intake {
            salary: update.salary.or(self.salary),
            assets: update.assets.or(self.assets),
            first_time_buyer: update.first_time_buyer.or(self.first_time_buyer),
            cars: update.cars.or(self.cars),
        }
    }

    /// Fields still needed, in prompt order. A zero salary is recorded but still missing.
    pub fn missing_fields(&self) -> Vec<IntakeField> {
        IntakeField::ALL.into_iter().filter(|field| !self.has(*field)).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    fn has(&self, field: IntakeField) -> bool {
        match field {
            IntakeField::Salary => self.salary.is_some_and(|salary| salary > 0),
            IntakeField::Assets => self.assets.is_some(),
            IntakeField::FirstTimeBuyer => self.first_time_buyer.is_some(),
            IntakeField::Cars => self.cars.is_some(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Intake, IntakeField, IntakeUpdate};

    #[test]
    fn merge_overwrites_only_determined_fields() {
        let intake = Intake { salary: Some(50_000), cars: Some(2), ..Intake::default() };
        let update = IntakeUpdate { salary: Some(75_000), assets: Some(0), ..Default::default() };

        let merged = intake.merge(&update);

        assert_eq!(merged.salary, Some(75_000));
        assert_eq!(merged.assets, Some(0));
        assert_eq!(merged.cars, Some(2));
        assert_eq!(merged.first_time_buyer, None);
    }

    #[test]
    fn merge_never_regresses_known_fields() {
        let intake = Intake { first_time_buyer: Some(false), ..Intake::default() };
        let merged = intake.merge(&IntakeUpdate::default());
        assert_eq!(merged.first_time_buyer, Some(false));
    }

    #[test]
    fn merging_same_update_twice_is_idempotent() {
        let update = IntakeUpdate {
            salary: Some(75_000),
            assets: Some(50_000),
            first_time_buyer: Some(true),
            cars: Some(1),
        };
        let once = Intake::default().merge(&update);
        let twice = once.merge(&update);
        assert_eq!(once, twice);
    }

    #[test]
    fn missing_fields_are_reported_in_prompt_order() {
        let intake = Intake { salary: Some(75_000), ..Intake::default() };
        assert_eq!(
            intake.missing_fields(),
            vec![IntakeField::Assets, IntakeField::FirstTimeBuyer, IntakeField::Cars]
        );
    }

    #[test]
    fn zero_salary_still_counts_as_missing() {
        let intake = Intake {
            salary: Some(0),
            assets: Some(10),
            first_time_buyer: Some(true),
            cars: Some(0),
        };
        assert_eq!(intake.missing_fields(), vec![IntakeField::Salary]);
        assert!(!intake.is_complete());
    }

    #[test]
    fn zero_assets_and_cars_are_known_values() {
        let intake = Intake {
            salary: Some(1),
            assets: Some(0),
            first_time_buyer: Some(false),
            cars: Some(0),
        };
        assert!(intake.is_complete());
    }
}
