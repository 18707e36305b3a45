//! Requirement expressions.
//!
//! Grammar:
//!
//! ```text
//! requirement = alternative ( "||" alternative )*
//! alternative = conjunct ( "/" conjunct )*
//! conjunct    = path op literal
//!             | [ "!" ] path
//!             | "Choose" count "from" domain
//! op          = ">=" | "<=" | "==" | "!=" | "=~" | "!~"
//! domain      = "any" [ sub ] | item ( "," item )*
//! ```
//!
//! Requirements are parsed once and kept as an AST: the compiler lowers them
//! into signal expressions, and the repair engine walks the same structure to
//! pick a fix.

use std::fmt;

use buildwright_domain::Value;

use super::pattern::Pattern;
use super::split::{find_top_level, split_on, split_whitespace, unquote, unwrap_item};
use super::ParseError;

/// Ordered comparison and equality operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Ge,
    Le,
    Eq,
    Ne,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Eq => "==",
            Self::Ne => "!=",
        }
    }

    /// Compare an attribute value against a literal. Unset reads as 0.
    pub fn holds(&self, actual: Option<&Value>, literal: &Value) -> bool {
        let zero = Value::Int(0);
        let actual = actual.unwrap_or(&zero);
        match self {
            Self::Ge => actual.numeric() >= literal.numeric(),
            Self::Le => actual.numeric() <= literal.numeric(),
            Self::Eq => actual.loosely_equals(literal),
            Self::Ne => !actual.loosely_equals(literal),
        }
    }
}

/// What a `Choose n from ...` directive ranges over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChoiceDomain {
    /// An explicit list of names.
    List(Vec<String>),
    /// `any`: every option of the surrounding category.
    Any,
    /// `any <Sub>`: every option tagged with a subcategory.
    AnyOf(String),
}

impl ChoiceDomain {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("any") {
            return Ok(Self::Any);
        }
        if let Some(sub) = strip_keyword(trimmed, "any") {
            let sub = unquote(sub).trim();
            if !sub.is_empty() {
                return Ok(Self::AnyOf(sub.to_string()));
            }
        }
        let items: Vec<String> = split_on(trimmed, ",")?
            .into_iter()
            .map(|item| unwrap_item(item).to_string())
            .filter(|item| !item.is_empty())
            .collect();
        if items.is_empty() {
            return Err(ParseError::Empty("choice domain"));
        }
        Ok(Self::List(items))
    }
}

impl fmt::Display for ChoiceDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List(items) => write!(f, "{}", items.join(",")),
            Self::Any => write!(f, "any"),
            Self::AnyOf(sub) => write!(f, "any {}", sub),
        }
    }
}

/// One condition inside an alternative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Conjunct {
    Compare {
        path: String,
        op: CompareOp,
        literal: Value,
    },
    Matches {
        path: String,
        pattern: Pattern,
        negated: bool,
    },
    Truthy {
        path: String,
        negated: bool,
    },
    Choose {
        count: u32,
        domain: ChoiceDomain,
    },
}

/// A `/`-joined list of conjuncts; holds when all of them hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alternative {
    pub conjuncts: Vec<Conjunct>,
}

/// A parsed requirement: holds when any alternative holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub source: String,
    pub alternatives: Vec<Alternative>,
}

/// Read access to attribute values, used to evaluate requirements directly.
pub trait AttributeLookup {
    fn value(&self, path: &str) -> Option<Value>;

    /// Attribute paths a choice domain ranges over.
    fn domain_paths(&self, domain: &ChoiceDomain) -> Vec<String>;
}

// =============================================================================
// Parsing
// =============================================================================

const OPERATORS: [(&str, Option<CompareOp>, bool); 6] = [
    (">=", Some(CompareOp::Ge), false),
    ("<=", Some(CompareOp::Le), false),
    ("==", Some(CompareOp::Eq), false),
    ("!=", Some(CompareOp::Ne), false),
    ("=~", None, false),
    ("!~", None, true),
];

impl Requirement {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let source = input.trim();
        if source.is_empty() {
            return Err(ParseError::Empty("requirement"));
        }

        let alternatives = split_on(source, "||")?
            .into_iter()
            .map(parse_alternative)
            .collect::<Result<Vec<_>, _>>()?;
        if alternatives.is_empty() {
            return Err(ParseError::malformed("requirement", source));
        }

        Ok(Self {
            source: source.to_string(),
            alternatives,
        })
    }

    /// `level >= n`
    pub fn min_level(level: u32) -> Self {
        Self::at_least("level", i64::from(level))
    }

    /// `<path> >= n`
    pub fn at_least(path: &str, value: i64) -> Self {
        Self::single(
            format!("{} >= {}", path, value),
            Conjunct::Compare {
                path: path.to_string(),
                op: CompareOp::Ge,
                literal: Value::Int(value),
            },
        )
    }

    /// `<path> =~ '<pattern>'`
    pub fn matching(path: &str, pattern: Pattern) -> Self {
        Self::single(
            format!("{} =~ '{}'", path, pattern.as_str()),
            Conjunct::Matches {
                path: path.to_string(),
                pattern,
                negated: false,
            },
        )
    }

    /// `!<path>`
    pub fn absent(path: &str) -> Self {
        Self::single(
            format!("!{}", path),
            Conjunct::Truthy {
                path: path.to_string(),
                negated: true,
            },
        )
    }

    fn single(source: String, conjunct: Conjunct) -> Self {
        Self {
            source,
            alternatives: vec![Alternative {
                conjuncts: vec![conjunct],
            }],
        }
    }

    pub fn is_satisfied(&self, lookup: &dyn AttributeLookup) -> bool {
        self.alternatives.iter().any(|alt| alt.holds(lookup))
    }

    /// Signal contribution: 0 when satisfied, else the number of alternatives.
    pub fn unsatisfied_count(&self, lookup: &dyn AttributeLookup) -> usize {
        if self.is_satisfied(lookup) {
            0
        } else {
            self.alternatives.len()
        }
    }

    /// Every attribute path referenced by a comparison or truthiness test.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.alternatives
            .iter()
            .flat_map(|alt| alt.conjuncts.iter())
            .filter_map(Conjunct::path)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

fn parse_alternative(input: &str) -> Result<Alternative, ParseError> {
    let conjuncts = split_on(input, "/")?
        .into_iter()
        .map(parse_conjunct)
        .collect::<Result<Vec<_>, _>>()?;
    if conjuncts.is_empty() {
        return Err(ParseError::malformed("alternative", input));
    }
    Ok(Alternative { conjuncts })
}

fn parse_conjunct(input: &str) -> Result<Conjunct, ParseError> {
    let text = unwrap_item(input);
    if text.is_empty() {
        return Err(ParseError::Empty("condition"));
    }

    if let Some(rest) = strip_keyword(text, "Choose") {
        return parse_choose(rest, text);
    }

    // Leftmost operator wins; ties prefer the earlier entry in OPERATORS.
    let mut found: Option<(usize, &str, Option<CompareOp>, bool)> = None;
    for (symbol, op, negated) in OPERATORS {
        if let Some(pos) = find_top_level(text, symbol)? {
            if found.map_or(true, |(best, ..)| pos < best) {
                found = Some((pos, symbol, op, negated));
            }
        }
    }

    match found {
        Some((pos, symbol, op, negated)) => {
            let path = validate_path(&text[..pos], text)?;
            let rhs = text[pos + symbol.len()..].trim();
            if rhs.is_empty() {
                return Err(ParseError::malformed("comparison", text));
            }
            match op {
                Some(op) => Ok(Conjunct::Compare {
                    path,
                    op,
                    literal: parse_literal(rhs),
                }),
                None => Ok(Conjunct::Matches {
                    path,
                    pattern: Pattern::new(unquote(rhs))?,
                    negated,
                }),
            }
        }
        None => {
            let (negated, path) = match text.strip_prefix('!') {
                Some(rest) => (true, rest),
                None => (false, text),
            };
            Ok(Conjunct::Truthy {
                path: validate_path(path, text)?,
                negated,
            })
        }
    }
}

fn parse_choose(rest: &str, whole: &str) -> Result<Conjunct, ParseError> {
    let words = split_whitespace(rest)?;
    let count_text = words
        .first()
        .ok_or_else(|| ParseError::malformed("choice", whole))?;
    let count: u32 = count_text
        .parse()
        .map_err(|_| ParseError::InvalidCount(count_text.to_string()))?;
    if count == 0 {
        return Err(ParseError::InvalidCount(count_text.to_string()));
    }
    let after_count = rest.trim_start()[count_text.len()..].trim_start();
    let domain_text =
        strip_keyword(after_count, "from").ok_or_else(|| ParseError::malformed("choice", whole))?;

    Ok(Conjunct::Choose {
        count,
        domain: ChoiceDomain::parse(domain_text)?,
    })
}

fn parse_literal(input: &str) -> Value {
    let trimmed = input.trim();
    let unquoted = unquote(trimmed);
    if unquoted.len() != trimmed.len() {
        return Value::text(unquoted);
    }
    match trimmed.parse::<i64>() {
        Ok(n) => Value::Int(n),
        Err(_) => Value::text(trimmed),
    }
}

fn validate_path(path: &str, whole: &str) -> Result<String, ParseError> {
    let path = unquote(path).trim();
    let bad = |c: char| matches!(c, '=' | '<' | '>' | '!' | '~' | '|' | '"' | '\'' | '?');
    if path.is_empty() || path.contains(bad) {
        return Err(ParseError::malformed("attribute path", whole));
    }
    Ok(path.to_string())
}

/// `input` without a leading case-insensitive keyword followed by whitespace.
pub(crate) fn strip_keyword<'a>(input: &'a str, keyword: &str) -> Option<&'a str> {
    let head = input.get(..keyword.len())?;
    let rest = &input[keyword.len()..];
    if head.eq_ignore_ascii_case(keyword) && rest.starts_with(char::is_whitespace) {
        Some(rest.trim_start())
    } else {
        None
    }
}

// =============================================================================
// Evaluation
// =============================================================================

impl Alternative {
    pub fn holds(&self, lookup: &dyn AttributeLookup) -> bool {
        self.conjuncts.iter().all(|c| c.holds(lookup))
    }

    /// Conjuncts that currently fail.
    pub fn failing<'a>(&'a self, lookup: &dyn AttributeLookup) -> Vec<&'a Conjunct> {
        self.conjuncts.iter().filter(|c| !c.holds(lookup)).collect()
    }
}

impl Conjunct {
    pub fn holds(&self, lookup: &dyn AttributeLookup) -> bool {
        match self {
            Self::Compare { path, op, literal } => op.holds(lookup.value(path).as_ref(), literal),
            Self::Matches {
                path,
                pattern,
                negated,
            } => {
                let text = lookup
                    .value(path)
                    .map(|v| v.to_string())
                    .unwrap_or_default();
                pattern.is_match(&text) != *negated
            }
            Self::Truthy { path, negated } => {
                let truthy = lookup.value(path).is_some_and(|v| v.is_truthy());
                truthy != *negated
            }
            Self::Choose { count, domain } => {
                let chosen = lookup
                    .domain_paths(domain)
                    .iter()
                    .filter(|p| lookup.value(p).is_some_and(|v| v.is_truthy()))
                    .count();
                chosen >= *count as usize
            }
        }
    }

    /// The single attribute path this conjunct tests, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Compare { path, .. } | Self::Matches { path, .. } | Self::Truthy { path, .. } => {
                Some(path)
            }
            Self::Choose { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    struct MapLookup(BTreeMap<String, Value>);

    impl MapLookup {
        fn new(pairs: &[(&str, Value)]) -> Self {
            Self(
                pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
            )
        }
    }

    impl AttributeLookup for MapLookup {
        fn value(&self, path: &str) -> Option<Value> {
            self.0.get(path).cloned()
        }

        fn domain_paths(&self, domain: &ChoiceDomain) -> Vec<String> {
            match domain {
                ChoiceDomain::List(items) => items.iter().map(|i| format!("feats.{}", i)).collect(),
                ChoiceDomain::Any => self
                    .0
                    .keys()
                    .filter(|k| k.starts_with("feats."))
                    .cloned()
                    .collect(),
                ChoiceDomain::AnyOf(sub) => {
                    let prefix = format!("featTraits.{}.", sub);
                    self.0
                        .keys()
                        .filter(|k| k.starts_with(&prefix))
                        .cloned()
                        .collect()
                }
            }
        }
    }

    fn check(text: &str, lookup: &MapLookup) -> bool {
        Requirement::parse(text)
            .expect("requirement parses")
            .is_satisfied(lookup)
    }

    #[test]
    fn representative_requirements_evaluate_as_expected() {
        let novice = MapLookup::new(&[("level", Value::Int(3))]);
        let veteran = MapLookup::new(&[
            ("level", Value::Int(5)),
            ("features.Rage", Value::Int(1)),
            ("rank.Athletics", Value::Int(2)),
            ("feats.Toughness", Value::Int(1)),
            ("feats.Power Attack", Value::Int(1)),
            ("alignment", Value::text("Neutral Good")),
        ]);

        assert!(!check("level >= 5", &novice));
        assert!(check("level >= 5", &veteran));

        assert!(!check("features.Rage", &novice));
        assert!(check("features.Rage", &veteran));

        assert!(!check("rank.Athletics >= 2", &novice));
        assert!(check("rank.Athletics >= 2", &veteran));

        assert!(!check("Choose 2 from any", &novice));
        assert!(check("Choose 2 from any", &veteran));

        assert!(!check("alignment =~ 'Good'", &novice));
        assert!(check("alignment =~ 'Good'", &veteran));
    }

    #[test]
    fn alternatives_and_conjuncts() {
        let req = Requirement::parse("level >= 5 / features.Rage || rank.Athletics >= 2")
            .expect("parses");
        assert_eq!(req.alternatives.len(), 2);
        assert_eq!(req.alternatives[0].conjuncts.len(), 2);

        let only_level = MapLookup::new(&[("level", Value::Int(5))]);
        assert!(!req.is_satisfied(&only_level));
        assert_eq!(req.unsatisfied_count(&only_level), 2);
        assert_eq!(req.alternatives[0].failing(&only_level).len(), 1);

        let athlete = MapLookup::new(&[("rank.Athletics", Value::Int(3))]);
        assert!(req.is_satisfied(&athlete));
        assert_eq!(req.unsatisfied_count(&athlete), 0);
    }

    #[test]
    fn negations() {
        let lookup = MapLookup::new(&[("alignment", Value::text("Chaotic Evil"))]);
        assert!(check("!features.Rage", &lookup));
        assert!(check("alignment !~ 'Good'", &lookup));
        assert!(check("deity != Iomedae", &lookup));
        assert!(check("alignment == 'Chaotic Evil'", &lookup));
    }

    #[test]
    fn unset_compares_as_zero() {
        let empty = MapLookup::new(&[]);
        assert!(check("rank.Stealth <= 0", &empty));
        assert!(check("level == 0", &empty));
        assert!(!check("level >= 1", &empty));
    }

    #[test]
    fn choose_domains() {
        let lookup = MapLookup::new(&[
            ("feats.Toughness", Value::Int(1)),
            ("featTraits.Skill.Assurance", Value::Int(1)),
        ]);
        assert!(check("Choose 1 from Toughness, Fleet", &lookup));
        assert!(!check("Choose 2 from Toughness, Fleet", &lookup));
        assert!(check("Choose 1 from any Skill", &lookup));
        assert!(!check("Choose 1 from any General", &lookup));

        let req = Requirement::parse("Choose 2 from any Skill").expect("parses");
        assert_eq!(
            req.alternatives[0].conjuncts[0],
            Conjunct::Choose {
                count: 2,
                domain: ChoiceDomain::AnyOf("Skill".to_string())
            }
        );
    }

    #[test]
    fn literal_kinds() {
        let req = Requirement::parse(r#"deity == "Iomedae""#).expect("parses");
        assert!(matches!(
            &req.alternatives[0].conjuncts[0],
            Conjunct::Compare { literal: Value::Text(t), .. } if t == "Iomedae"
        ));
        let req = Requirement::parse("scores.strength >= 14").expect("parses");
        assert!(matches!(
            &req.alternatives[0].conjuncts[0],
            Conjunct::Compare { literal: Value::Int(14), op: CompareOp::Ge, .. }
        ));
    }

    #[test]
    fn parse_errors() {
        assert_eq!(Requirement::parse("  "), Err(ParseError::Empty("requirement")));
        assert_eq!(
            Requirement::parse("Choose two from any"),
            Err(ParseError::InvalidCount("two".to_string()))
        );
        assert!(matches!(
            Requirement::parse("Choose 2 of any"),
            Err(ParseError::Malformed { what: "choice", .. })
        ));
        assert!(matches!(
            Requirement::parse(">= 5"),
            Err(ParseError::Malformed { .. })
        ));
        assert!(matches!(
            Requirement::parse("alignment =~ '('"),
            Err(ParseError::Malformed { what: "pattern", .. })
        ));
        assert!(matches!(
            Requirement::parse("level >= (5"),
            Err(ParseError::UnbalancedDelimiter(_))
        ));
    }

    #[test]
    fn min_level_matches_parsed_form() {
        assert_eq!(
            Requirement::min_level(4),
            Requirement::parse("level >= 4").expect("parses")
        );
    }

    #[test]
    fn paths_lists_tested_attributes() {
        let req = Requirement::parse("level >= 2 / !features.Rage || Choose 1 from any")
            .expect("parses");
        let paths: Vec<&str> = req.paths().collect();
        assert_eq!(paths, vec!["level", "features.Rage"]);
    }
}
