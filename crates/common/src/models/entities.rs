//! Source records, one type per collection in the tabular store
//!
//! Records are flat and use camelCase field names on the wire. Monetary
//! amounts are integers in the smallest currency unit; a negative amount
//! fails deserialization instead of being clamped.

use super::FiscalYear;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Funder {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub funder_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contribution {
    pub id: String,
    pub funder_id: String,
    pub state_code: String,
    /// Label as stored; compare through [`Contribution::fiscal_year`]
    #[serde(rename = "fiscalYear")]
    pub fiscal_year_label: String,
    pub amount: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiative: Option<String>,
}

impl Contribution {
    pub fn fiscal_year(&self) -> Option<FiscalYear> {
        FiscalYear::normalize(&self.fiscal_year_label)
    }

    pub fn in_fiscal_year(&self, fiscal_year: FiscalYear) -> bool {
        self.fiscal_year() == Some(fiscal_year)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateTarget {
    pub state_code: String,
    #[serde(rename = "fiscalYear")]
    pub fiscal_year_label: String,
    pub target_amount: u64,
}

impl StateTarget {
    pub fn fiscal_year(&self) -> Option<FiscalYear> {
        FiscalYear::normalize(&self.fiscal_year_label)
    }
}

/// A not-yet-secured opportunity in the fundraising pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prospect {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_code: Option<String>,
    pub stage: String,
    pub estimated_amount: u64,
    /// Win probability, documented as 0.0..=1.0 but not enforced by the store
    pub probability: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_close_date: Option<NaiveDate>,
}

impl Prospect {
    /// Probability clamped into [0, 1]; NaN counts as 0
    pub fn clamped_probability(&self) -> f64 {
        if self.probability.is_nan() {
            0.0
        } else {
            self.probability.clamp(0.0, 1.0)
        }
    }

    pub fn has_valid_probability(&self) -> bool {
        (0.0..=1.0).contains(&self.probability)
    }

    pub fn weighted_value(&self) -> f64 {
        self.estimated_amount as f64 * self.clamped_probability()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinator: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct School {
    pub id: String,
    pub state_code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contribution_wire_format() {
        let json = r#"{
            "id": "C1",
            "funderId": "F1",
            "stateCode": "KA",
            "fiscalYear": "2024-25",
            "amount": 8000000,
            "date": "2024-06-15"
        }"#;
        let contribution: Contribution = serde_json::from_str(json).unwrap();
        assert_eq!(contribution.amount, 8_000_000);
        assert_eq!(contribution.fiscal_year().unwrap().to_string(), "FY24-25");
        assert!(contribution.initiative.is_none());
    }

    #[test]
    fn test_negative_amount_is_rejected() {
        let json = r#"{
            "id": "C1", "funderId": "F1", "stateCode": "KA",
            "fiscalYear": "FY24-25", "amount": -5
        }"#;
        assert!(serde_json::from_str::<Contribution>(json).is_err());

        let json = r#"{ "stateCode": "KA", "fiscalYear": "FY24-25", "targetAmount": -1 }"#;
        assert!(serde_json::from_str::<StateTarget>(json).is_err());
    }

    #[test]
    fn test_funder_type_field() {
        let json = r#"{ "id": "F1", "name": "Alpha", "type": "CSR", "owner": "Asha" }"#;
        let funder: Funder = serde_json::from_str(json).unwrap();
        assert_eq!(funder.funder_type.as_deref(), Some("CSR"));
        assert!(funder.priority.is_none());
    }

    #[test]
    fn test_prospect_probability_clamp() {
        let mut prospect = Prospect {
            id: "P1".into(),
            name: "Gamma Trust".into(),
            state_code: None,
            stage: "Lead".into(),
            estimated_amount: 1_000,
            probability: 1.5,
            next_action: None,
            owner: None,
            expected_close_date: None,
        };
        assert!(!prospect.has_valid_probability());
        assert_eq!(prospect.weighted_value(), 1_000.0);

        prospect.probability = -0.2;
        assert_eq!(prospect.weighted_value(), 0.0);

        prospect.probability = f64::NAN;
        assert_eq!(prospect.clamped_probability(), 0.0);
    }
}
