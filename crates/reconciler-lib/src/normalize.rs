//! Canonicalization of parsed commitments
//!
//! Normalization is idempotent: running it over its own output changes
//! nothing and emits the same warnings.

use crate::error::{ImportError, ImportErrors};
use crate::models::{Commitment, Provider};
use crate::report::Warning;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};

/// GCP CUD plans accepted by the control plane
pub const GCP_PLANS: &[&str] = &["TWELVE_MONTHS", "THIRTY_SIX_MONTHS"];

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];

/// Keep only the part after the last `/` (GCP regions arrive as URLs)
pub fn normalize_region(region: &str) -> String {
    let trimmed = region.trim().trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(idx) => trimmed[idx + 1..].to_string(),
        None => trimmed.to_string(),
    }
}

/// Format a timestamp as UTC RFC3339 with second precision.
///
/// RFC3339 input with any offset is converted to UTC; naive date-times are
/// taken as UTC and bare dates as midnight UTC.
pub fn normalize_timestamp(field: &str, raw: &str, location: &str) -> Result<String, ImportError> {
    let trimmed = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(format_utc(dt.with_timezone(&Utc)));
    }

    for format in DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(format_utc(Utc.from_utc_datetime(&naive)));
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            if let Some(naive) = date.and_hms_opt(0, 0, 0) {
                return Ok(format_utc(Utc.from_utc_datetime(&naive)));
            }
        }
    }

    Err(ImportError::parse(field, raw, location))
}

fn format_utc(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Negative counts are clamped to zero; `None` stays unset
pub fn clamp_non_negative(value: Option<i64>) -> Option<i64> {
    value.map(|v| v.max(0))
}

/// ISO-8601 period such as `P1Y`, `P3Y` or `P1Y6M`
pub fn is_iso8601_period(term: &str) -> bool {
    let Some(rest) = term.strip_prefix('P') else {
        return false;
    };
    if rest.is_empty() {
        return false;
    }

    let mut digits = 0;
    let mut last_unit = 0;
    for c in rest.chars() {
        if c.is_ascii_digit() {
            digits += 1;
            continue;
        }
        let unit = match c {
            'Y' => 1,
            'M' => 2,
            'W' => 3,
            'D' => 4,
            _ => return false,
        };
        if digits == 0 || unit <= last_unit {
            return false;
        }
        digits = 0;
        last_unit = unit;
    }
    digits == 0
}

/// Whether a plan or term is in the enumerated set for its provider
pub fn is_known_plan(provider: Provider, plan: &str) -> bool {
    match provider {
        Provider::Gcp => GCP_PLANS.contains(&plan),
        Provider::Azure => is_iso8601_period(plan),
    }
}

/// Normalize one commitment.
///
/// Returns the canonical record and any warnings; an unparseable timestamp
/// fails the record.
pub fn normalize_commitment(
    mut commitment: Commitment,
) -> Result<(Commitment, Vec<Warning>), ImportError> {
    let mut warnings = Vec::new();
    let location = format!("{} commitment {}", commitment.provider, commitment.name);

    commitment.name = commitment.name.trim().to_string();
    commitment.region = commitment
        .region
        .as_deref()
        .map(normalize_region)
        .filter(|r| !r.is_empty());

    commitment.start_timestamp = commitment
        .start_timestamp
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .map(|t| normalize_timestamp("start_timestamp", t, &location))
        .transpose()?;
    commitment.end_timestamp = commitment
        .end_timestamp
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .map(|t| normalize_timestamp("end_timestamp", t, &location))
        .transpose()?;

    commitment.cpu_cores = clamp_non_negative(commitment.cpu_cores);
    commitment.memory_mib = clamp_non_negative(commitment.memory_mib);
    commitment.count = clamp_non_negative(commitment.count);

    if let Some(plan) = &commitment.plan {
        if !is_known_plan(commitment.provider, plan) {
            warnings.push(Warning::UnknownPlan {
                key: commitment.key(),
                provider: commitment.provider,
                plan: plan.clone(),
            });
        }
    }

    Ok((commitment, warnings))
}

/// Normalize a whole parsed set, keeping order and reporting every failure
pub fn normalize_all(
    commitments: Vec<Commitment>,
) -> Result<(Vec<Commitment>, Vec<Warning>), ImportErrors> {
    let mut normalized = Vec::with_capacity(commitments.len());
    let mut warnings = Vec::new();
    let mut errors = ImportErrors::default();

    for commitment in commitments {
        match normalize_commitment(commitment) {
            Ok((c, w)) => {
                normalized.push(c);
                warnings.extend(w);
            }
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        Ok((normalized, warnings))
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gcp_commitment() -> Commitment {
        let mut c = Commitment::new(Provider::Gcp, "test-cud");
        c.region = Some(
            "https://www.googleapis.com/compute/v1/projects/demo/regions/us-central1".to_string(),
        );
        c.commitment_type = Some("COMPUTE_OPTIMIZED_C2D".to_string());
        c.plan = Some("TWELVE_MONTHS".to_string());
        c.start_timestamp = Some("2023-01-01T00:00:00-07:00".to_string());
        c.end_timestamp = Some("2024-01-01T00:00:00-07:00".to_string());
        c.cpu_cores = Some(10);
        c.memory_mib = Some(20480);
        c
    }

    #[test]
    fn test_normalize_region() {
        assert_eq!(
            normalize_region("https://www.googleapis.com/compute/v1/projects/p/regions/us-central1"),
            "us-central1"
        );
        assert_eq!(normalize_region("projects/p/regions/europe-west4/"), "europe-west4");
        assert_eq!(normalize_region("eastus"), "eastus");
    }

    #[test]
    fn test_normalize_timestamp_formats() {
        assert_eq!(
            normalize_timestamp("start", "2023-01-01T00:00:00-07:00", "x").unwrap(),
            "2023-01-01T07:00:00Z"
        );
        assert_eq!(
            normalize_timestamp("start", "2023-05-05T10:11:12.123456Z", "x").unwrap(),
            "2023-05-05T10:11:12Z"
        );
        assert_eq!(
            normalize_timestamp("start", "2023-05-05", "x").unwrap(),
            "2023-05-05T00:00:00Z"
        );
        assert_eq!(
            normalize_timestamp("start", "05/06/2023", "x").unwrap(),
            "2023-05-06T00:00:00Z"
        );
        assert!(matches!(
            normalize_timestamp("end_timestamp", "next year", "x"),
            Err(ImportError::Parse { ref field, .. }) if field == "end_timestamp"
        ));
    }

    #[test]
    fn test_iso8601_period() {
        assert!(is_iso8601_period("P1Y"));
        assert!(is_iso8601_period("P3Y"));
        assert!(is_iso8601_period("P1Y6M"));
        assert!(!is_iso8601_period("P"));
        assert!(!is_iso8601_period("3Y"));
        assert!(!is_iso8601_period("P6M1Y"));
        assert!(!is_iso8601_period("P1"));
        assert!(!is_iso8601_period("One Year"));
    }

    #[test]
    fn test_normalize_commitment() {
        let (c, warnings) = normalize_commitment(gcp_commitment()).unwrap();
        assert_eq!(c.region.as_deref(), Some("us-central1"));
        assert_eq!(c.start_timestamp.as_deref(), Some("2023-01-01T07:00:00Z"));
        assert_eq!(c.end_timestamp.as_deref(), Some("2024-01-01T07:00:00Z"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut input = gcp_commitment();
        input.cpu_cores = Some(-3);
        input.plan = Some("SIXTY_MONTHS".to_string());

        let (once, first_warnings) = normalize_commitment(input).unwrap();
        let (twice, second_warnings) = normalize_commitment(once.clone()).unwrap();
        assert_eq!(once, twice);
        assert_eq!(first_warnings, second_warnings);
    }

    #[test]
    fn test_negative_integers_clamp_and_unset_stays_unset() {
        let mut input = gcp_commitment();
        input.cpu_cores = Some(-1);
        input.memory_mib = None;

        let (c, _) = normalize_commitment(input).unwrap();
        assert_eq!(c.cpu_cores, Some(0));
        assert_eq!(c.memory_mib, None);
    }

    #[test]
    fn test_unknown_plan_is_kept_with_warning() {
        let mut input = gcp_commitment();
        input.plan = Some("SIXTY_MONTHS".to_string());

        let (c, warnings) = normalize_commitment(input).unwrap();
        assert_eq!(c.plan.as_deref(), Some("SIXTY_MONTHS"));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind(), "unknown_plan");
    }

    #[test]
    fn test_azure_term_validation() {
        let mut c = Commitment::new(Provider::Azure, "res");
        c.plan = Some("P3Y".to_string());
        assert!(normalize_commitment(c.clone()).unwrap().1.is_empty());

        c.plan = Some("3 Years".to_string());
        assert_eq!(normalize_commitment(c).unwrap().1.len(), 1);
    }

    #[test]
    fn test_normalize_all_reports_every_bad_record() {
        let mut a = gcp_commitment();
        a.start_timestamp = Some("garbage".to_string());
        let mut b = gcp_commitment();
        b.end_timestamp = Some("also garbage".to_string());

        let errors = normalize_all(vec![a, gcp_commitment(), b]).unwrap_err();
        assert_eq!(errors.len(), 2);
    }
}
