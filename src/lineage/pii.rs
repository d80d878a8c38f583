//! PII classification for columns.
//!
//! Two independent classifiers with intentionally different behavior:
//!
//! - [`detect_pii_in_column`] runs a tiered pattern match over a column's
//!   name and description, used while building column lineage.
//! - [`is_pii_column`] decides whether governance tags should trigger
//!   masking. Explicit business/operational tags short-circuit to false even
//!   when a PII-looking tag is also present.

use super::model::PiiSensitivity;

const HIGH_PATTERNS: &[&str] = &[
    "ssn",
    "social_security",
    "passport",
    "national_id",
    "license_number",
    "credit_card",
    "account_number",
    "password",
    "secret",
    "private_key",
];

const MEDIUM_PATTERNS: &[&str] = &[
    "email",
    "phone",
    "mobile",
    "address",
    "zip",
    "postal",
    "birth_date",
    "birthday",
    "age",
    "gender",
    "race",
    "ethnicity",
];

const LOW_PATTERNS: &[&str] = &[
    "name",
    "first_name",
    "last_name",
    "full_name",
    "username",
    "user_id",
];

/// Tiered PII detection over a column name and description. Tiers are
/// checked HIGH to LOW and the first match wins.
pub fn detect_pii_in_column(column_name: &str, description: &str) -> (bool, PiiSensitivity) {
    let combined = format!("{} {}", column_name, description).to_lowercase();

    let tiers = [
        (PiiSensitivity::High, HIGH_PATTERNS),
        (PiiSensitivity::Medium, MEDIUM_PATTERNS),
        (PiiSensitivity::Low, LOW_PATTERNS),
    ];
    for (sensitivity, patterns) in tiers {
        if patterns.iter().any(|p| combined.contains(p)) {
            return (true, sensitivity);
        }
    }
    (false, PiiSensitivity::None)
}

const NON_PII_TAGS: &[&str] = &[
    "ANALYTICAL",
    "OPERATIONAL",
    "PUBLIC",
    "INTERNAL",
    "METADATA",
    "BUSINESS",
    "REFERENCE",
    "DIMENSION",
    "FACT",
    "METRIC",
];

const PII_TAGS: &[&str] = &[
    "PII",
    "SENSITIVE",
    "DATA_PRIVACY",
    "CRITICAL_PII",
    "FINANCIAL",
    "PAYMENT_INFO",
    "CREDENTIALS",
    "EMAIL",
    "PHONE",
    "SSN",
    "PERSONAL_INFO",
    "CONFIDENTIAL",
    "SECRET",
    "RESTRICTED",
];

/// Tag-based masking decision. Business/operational tags must never trigger
/// masking, so any non-PII tag wins over a co-present PII tag.
pub fn is_pii_column(tags: &[String]) -> bool {
    let tags_upper = tags.join(" ").to_uppercase();

    if NON_PII_TAGS.iter().any(|t| tags_upper.contains(t)) {
        return false;
    }
    PII_TAGS.iter().any(|t| tags_upper.contains(t))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssn_is_high_sensitivity() {
        let (is_pii, sensitivity) = detect_pii_in_column("user_ssn", "");
        assert!(is_pii);
        assert_eq!(sensitivity, PiiSensitivity::High);
    }

    #[test]
    fn test_status_flag_is_not_pii() {
        let (is_pii, sensitivity) = detect_pii_in_column("status_flag", "");
        assert!(!is_pii);
        assert_eq!(sensitivity, PiiSensitivity::None);
    }

    #[test]
    fn test_first_matching_tier_wins() {
        // "email" is MEDIUM even though "name" (LOW) also matches the text.
        let (is_pii, sensitivity) = detect_pii_in_column("email", "customer name and email");
        assert!(is_pii);
        assert_eq!(sensitivity, PiiSensitivity::Medium);

        // Description alone can trigger detection.
        let (is_pii, sensitivity) = detect_pii_in_column("col_a", "stores the passport number");
        assert!(is_pii);
        assert_eq!(sensitivity, PiiSensitivity::High);
    }

    #[test]
    fn test_tags_trigger_masking() {
        assert!(is_pii_column(&["PII".to_string()]));
        assert!(is_pii_column(&["payment_info".to_string()]));
        assert!(!is_pii_column(&["customer".to_string()]));
    }

    #[test]
    fn test_business_tags_never_mask() {
        // Non-PII tags short-circuit even when a PII tag is present.
        assert!(!is_pii_column(&[
            "PII".to_string(),
            "analytical".to_string()
        ]));
        assert!(!is_pii_column(&["operational".to_string()]));
        assert!(!is_pii_column(&["DIMENSION".to_string(), "SSN".to_string()]));
    }
}
