//! Structured report produced by a `ReportParser`, and the records derived
//! from it for persistence.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{Identifier, Period};

/// Sales totals for one season.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SalesSummary {
    pub total_bales: Option<u64>,
    pub total_mass_kg: Option<f64>,
    pub total_value_usd: Option<f64>,
    pub average_price_usd: Option<f64>,
}

/// One row of the grade breakdown.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradeEntry {
    pub grade_name: String,
    pub mass_kg: Option<f64>,
    pub value_usd: Option<f64>,
    pub average_price_usd: Option<f64>,
}

/// One creditor's recovery against the season's sales.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreditorRecovery {
    pub creditor_name: String,
    pub total_owed_usd: Option<f64>,
    pub total_paid_usd: Option<f64>,
    pub recovery_percentage: Option<f64>,
    /// Raw recovery text when it was not a number
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub notes: String,
}

/// Parsed analysis page for one (identifier, period).
///
/// Identity and period-scoped fields keep the portal's labels, normalized to
/// `snake_case` keys. Immutable once built.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredReport {
    pub identity: BTreeMap<String, String>,
    pub period_fields: BTreeMap<String, String>,
    pub summary: SalesSummary,
    pub grades: Vec<GradeEntry>,
    pub creditors: Vec<CreditorRecovery>,
}

impl StructuredReport {
    fn identity_field(&self, key: &str) -> &str {
        self.identity.get(key).map(|s| s.trim()).unwrap_or("")
    }

    /// Grower name as shown on the page; empty when the page carries no grower.
    pub fn name(&self) -> &str {
        self.identity_field("name")
    }

    /// A report counts as data only if it names a grower.
    pub fn has_identity(&self) -> bool {
        !self.name().is_empty()
    }

    /// Contractor for `period`: the season-labelled field first, then the
    /// generic one.
    pub fn contractor(&self, period: Period) -> Option<&str> {
        let seasonal = format!("{period}_contractor");
        let found = [seasonal.as_str(), "contractor"]
            .into_iter()
            .filter_map(|key| self.period_fields.get(key))
            .map(|s| s.trim())
            .find(|s| !s.is_empty());
        found
    }

    /// Identity record for the grower this report belongs to.
    pub fn grower_identity(&self, id: &Identifier) -> GrowerIdentity {
        let optional = |key: &str| {
            let v = self.identity_field(key);
            (!v.is_empty()).then(|| v.to_string())
        };
        GrowerIdentity {
            id: id.clone(),
            portal_number: optional("grower_number"),
            name: self.name().to_string(),
            surname: self.identity_field("surname").to_string(),
            national_id: optional("national_id"),
            farming_province: self.identity_field("farming_province").to_string(),
            farm_name: self.identity_field("farm_name").to_string(),
            address: self.identity_field("address").to_string(),
            first_sales_year: self
                .period_fields
                .get("first_sales_record_found")
                .and_then(|s| s.trim().parse().ok()),
        }
    }
}

/// Identity fields of a grower, keyed by the probed identifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GrowerIdentity {
    pub id: Identifier,
    /// Grower number as printed by the portal, when present
    pub portal_number: Option<String>,
    pub name: String,
    pub surname: String,
    pub national_id: Option<String>,
    pub farming_province: String,
    pub farm_name: String,
    pub address: String,
    pub first_sales_year: Option<Period>,
}

/// Persisted grower, as returned by the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Grower {
    pub identity: GrowerIdentity,
}

impl Grower {
    pub fn id(&self) -> &Identifier {
        &self.identity.id
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.identity.name, self.identity.surname)
            .trim()
            .to_string()
    }
}

/// Everything persisted for one (grower, period). Written all-or-nothing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeasonalReport {
    pub grower: Identifier,
    pub period: Period,
    pub contractor: Option<String>,
    pub summary: SalesSummary,
    pub grades: Vec<GradeEntry>,
    pub creditors: Vec<CreditorRecovery>,
}

impl SeasonalReport {
    /// Season record for `grower`. Creditor rows without a name are dropped.
    pub fn from_report(grower: &Grower, period: Period, report: &StructuredReport) -> Self {
        Self {
            grower: grower.id().clone(),
            period,
            contractor: report.contractor(period).map(str::to_string),
            summary: report.summary.clone(),
            grades: report.grades.clone(),
            creditors: report
                .creditors
                .iter()
                .filter(|c| !c.creditor_name.trim().is_empty())
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report_with(identity: &[(&str, &str)], period: &[(&str, &str)]) -> StructuredReport {
        StructuredReport {
            identity: identity
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            period_fields: period
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn blank_name_is_not_identity() {
        assert!(!report_with(&[("name", "   ")], &[]).has_identity());
        assert!(!StructuredReport::default().has_identity());
        assert!(report_with(&[("name", "Tendai")], &[]).has_identity());
    }

    #[test]
    fn contractor_prefers_seasonal_key() {
        let r = report_with(
            &[],
            &[("2024_contractor", "Alpha Leaf"), ("contractor", "Generic")],
        );
        assert_eq!(r.contractor(2024), Some("Alpha Leaf"));
        assert_eq!(r.contractor(2023), Some("Generic"));
    }

    #[test]
    fn contractor_skips_blank() {
        let r = report_with(&[], &[("2024_contractor", " "), ("contractor", "")]);
        assert_eq!(r.contractor(2024), None);
    }

    #[test]
    fn identity_from_report() {
        let r = report_with(
            &[
                ("name", "Tendai"),
                ("surname", "Moyo"),
                ("grower_number", "V100081"),
                ("national_id", ""),
                ("farming_province", "Mashonaland East"),
            ],
            &[("first_sales_record_found", "2019")],
        );
        let id = Identifier::new("V", 100081);
        let identity = r.grower_identity(&id);
        assert_eq!(identity.id, id);
        assert_eq!(identity.portal_number.as_deref(), Some("V100081"));
        assert_eq!(identity.national_id, None);
        assert_eq!(identity.first_sales_year, Some(2019));
        assert_eq!(identity.farm_name, "");
        let grower = Grower { identity };
        assert_eq!(grower.display_name(), "Tendai Moyo");
    }

    #[test]
    fn seasonal_report_drops_unnamed_creditors() {
        let mut r = report_with(&[("name", "A")], &[]);
        r.creditors = vec![
            CreditorRecovery {
                creditor_name: "Agribank".into(),
                total_owed_usd: Some(100.0),
                total_paid_usd: Some(50.0),
                recovery_percentage: Some(50.0),
                notes: String::new(),
            },
            CreditorRecovery {
                creditor_name: " ".into(),
                total_owed_usd: None,
                total_paid_usd: None,
                recovery_percentage: None,
                notes: String::new(),
            },
        ];
        let grower = Grower {
            identity: r.grower_identity(&Identifier::new("V", 1)),
        };
        let season = SeasonalReport::from_report(&grower, 2020, &r);
        assert_eq!(season.creditors.len(), 1);
        assert_eq!(season.period, 2020);
        assert_eq!(season.grower, Identifier::new("V", 1));
    }
}
