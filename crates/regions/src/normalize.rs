use serde::{Deserialize, Serialize};

/// Canonicalization rule for region identifiers.
///
/// Both the server-provided identifier list and user data pass through the
/// same rule, so "POA 0800", "0800" and "800" can all land on the same
/// canonical form. Replacements are literal substring pairs applied after
/// case folding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Normalization {
    pub case_fold: bool,
    pub strip_leading_zeros: bool,
    pub replacements: Vec<(String, String)>,
}

impl Default for Normalization {
    fn default() -> Self {
        Self {
            case_fold: true,
            strip_leading_zeros: true,
            replacements: Vec::new(),
        }
    }
}

impl Normalization {
    /// Canonicalizes a raw value, or `None` if it cannot possibly name a
    /// region (empty once trimmed).
    pub fn apply(&self, raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        let mut value = if self.case_fold {
            trimmed.to_lowercase()
        } else {
            trimmed.to_string()
        };

        for (from, to) in &self.replacements {
            value = value.replace(from.as_str(), to);
        }

        if self.strip_leading_zeros && value.len() > 1 {
            let stripped = value.trim_start_matches('0');
            // "000" stays "0" rather than vanishing.
            value = if stripped.is_empty() {
                "0".to_string()
            } else {
                stripped.to_string()
            };
        }

        if value.is_empty() {
            None
        } else {
            Some(value)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Normalization;

    #[test]
    fn folds_case_and_trims() {
        let n = Normalization::default();
        assert_eq!(n.apply("  NSW "), Some("nsw".to_string()));
    }

    #[test]
    fn strips_leading_zeros() {
        let n = Normalization::default();
        assert_eq!(n.apply("010"), Some("10".to_string()));
        assert_eq!(n.apply("0"), Some("0".to_string()));
        assert_eq!(n.apply("000"), Some("0".to_string()));
    }

    #[test]
    fn empty_values_cannot_name_a_region() {
        let n = Normalization::default();
        assert_eq!(n.apply(""), None);
        assert_eq!(n.apply("   "), None);
    }

    #[test]
    fn applies_literal_replacements() {
        let n = Normalization {
            replacements: vec![(" (s)".to_string(), String::new())],
            ..Normalization::default()
        };
        assert_eq!(n.apply("Baw Baw (S)"), Some("baw baw".to_string()));
    }
}
