//! `Key=Value` attribute blocks.

use super::split::{find_top_level, split_on, split_whitespace, unwrap_item};
use super::ParseError;

/// One `Key=Value` field of an entity's attribute string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    pub key: String,
    /// Comma-separated items with quotes and enclosing parentheses removed.
    pub values: Vec<String>,
    /// The value text as written, before splitting.
    pub raw: String,
}

impl KeyValue {
    /// The value list joined back into one string.
    pub fn joined(&self) -> String {
        self.values.join(",")
    }

    /// Every value item split further on top-level `;`.
    pub fn entries(&self) -> Result<Vec<String>, ParseError> {
        let mut entries = Vec::new();
        for value in &self.values {
            for piece in split_on(value, ";")? {
                entries.push(unwrap_item(piece).to_string());
            }
        }
        Ok(entries)
    }
}

/// Parse a whitespace-separated block of `Key=Value` tokens.
///
/// Unbalanced delimiters fail the whole block; a token with no top-level `=`
/// is a [`ParseError::MissingEquals`].
pub fn parse_key_values(input: &str) -> Result<Vec<KeyValue>, ParseError> {
    split_whitespace(input)?
        .into_iter()
        .map(parse_token)
        .collect()
}

fn parse_token(token: &str) -> Result<KeyValue, ParseError> {
    let eq = find_top_level(token, "=")?
        .ok_or_else(|| ParseError::MissingEquals(token.to_string()))?;
    let key = token[..eq].trim();
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ParseError::MissingEquals(token.to_string()));
    }
    let raw = token[eq + 1..].trim();
    let values = split_on(raw, ",")?
        .into_iter()
        .map(|item| unwrap_item(item).to_string())
        .filter(|item| !item.is_empty())
        .collect();

    Ok(KeyValue {
        key: key.to_string(),
        values,
        raw: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lists_and_quoted_items() {
        let fields = parse_key_values(
            r#"Traits=General,Skill Require="level >= 2" Features="1:Rage","3:Deny Advantage""#,
        )
        .expect("valid block");

        assert_eq!(fields.len(), 3);
        assert_eq!(fields[0].key, "Traits");
        assert_eq!(fields[0].values, vec!["General", "Skill"]);
        assert_eq!(fields[1].values, vec!["level >= 2"]);
        assert_eq!(fields[2].values, vec!["1:Rage", "3:Deny Advantage"]);
    }

    #[test]
    fn both_quote_styles_protect_separators() {
        let fields = parse_key_values(r#"Alignment='Lawful Good',"Neutral Good""#).expect("valid");
        assert_eq!(fields[0].values, vec!["Lawful Good", "Neutral Good"]);

        let fields = parse_key_values(r#"Require='alignment =~ "Good"'"#).expect("valid");
        assert_eq!(fields[0].values, vec![r#"alignment =~ "Good""#]);
    }

    #[test]
    fn parenthesized_values_keep_inner_spaces() {
        let text = "Ranks=(Skill Trained (Athletics; Choose 2 from any))";
        let fields = parse_key_values(text).expect("valid");
        assert_eq!(
            fields[0].values,
            vec!["Skill Trained (Athletics; Choose 2 from any)"]
        );
    }

    #[test]
    fn semicolon_entries() {
        let fields = parse_key_values(r#"Features="1:Rage;3:Deny Advantage""#).expect("valid");
        assert_eq!(
            fields[0].entries().expect("balanced"),
            vec!["1:Rage", "3:Deny Advantage"]
        );
    }

    #[test]
    fn token_without_equals_is_rejected() {
        assert_eq!(
            parse_key_values("Traits=General Oops"),
            Err(ParseError::MissingEquals("Oops".to_string()))
        );
    }

    #[test]
    fn unbalanced_block_is_rejected() {
        assert!(matches!(
            parse_key_values("Require='level >= 2"),
            Err(ParseError::UnbalancedDelimiter(_))
        ));
    }

    #[test]
    fn empty_block_has_no_fields() {
        assert_eq!(parse_key_values("   "), Ok(vec![]));
    }
}
