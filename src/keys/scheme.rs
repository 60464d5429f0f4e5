//! Templated derivation schemes.
//!
//! A scheme is a derivation-path template in which levels are either literal
//! integers or named placeholders (`<coin_type>`, `<account>`, `<node>`,
//! `<address>`), each optionally hardened. Placeholders are bound by level
//! through the `set_*` methods, sub-schemes are sliced out by level or depth,
//! and a fully bound scheme folds into a concrete [`DerivationPath`].
//!
//! Schemes written without placeholders keep working through a legacy
//! fallback: when no level is explicitly labelled `<node>` and the scheme has
//! at most five segments, unlabelled positions take the canonical BIP44 level
//! order positionally. That heuristic is preserved as observed and pinned by
//! tests for every scheme length it applies to.

use std::fmt;
use std::str::FromStr;

use super::path::DerivationPath;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemeError {
    #[error("invalid derivation scheme: {0}")]
    Parse(String),
}

/// The role a scheme node plays in the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemeLevel {
    Undefined,
    CoinType,
    AccountIndex,
    Node,
    AddressIndex,
}

impl SchemeLevel {
    fn token(self) -> &'static str {
        match self {
            SchemeLevel::Undefined => "<undefined>",
            SchemeLevel::CoinType => "<coin_type>",
            SchemeLevel::AccountIndex => "<account>",
            SchemeLevel::Node => "<node>",
            SchemeLevel::AddressIndex => "<address>",
        }
    }
}

/// One level of a scheme: literal or placeholder, bound or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeNode {
    pub level: SchemeLevel,
    pub value: Option<u32>,
    pub hardened: bool,
}

/// An ordered derivation-path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationScheme {
    nodes: Vec<SchemeNode>,
}

/// Canonical BIP44 level order used by the legacy fallback labelling.
const CANONICAL_LEVELS: [SchemeLevel; 5] = [
    SchemeLevel::Undefined,
    SchemeLevel::CoinType,
    SchemeLevel::AccountIndex,
    SchemeLevel::Node,
    SchemeLevel::AddressIndex,
];

impl DerivationScheme {
    /// Parse a scheme template such as `44'/<coin_type>'/<account>'/<node>/<address>`.
    pub fn parse(input: &str) -> Result<Self, SchemeError> {
        if input.is_empty() || input == "m" {
            return Ok(Self { nodes: Vec::new() });
        }

        let rest = input.strip_prefix("m/").unwrap_or(input);
        let mut nodes = Vec::new();
        let mut explicit = Vec::new();
        for (position, token) in rest.split('/').enumerate() {
            let (node, is_explicit) = parse_node(token, position)?;
            nodes.push(node);
            explicit.push(is_explicit);
        }

        // Legacy fallback: schemes written as bare literals predate the
        // placeholder tokens and rely on the canonical BIP44 level order.
        let has_explicit_node = nodes
            .iter()
            .zip(&explicit)
            .any(|(node, is_explicit)| *is_explicit && node.level == SchemeLevel::Node);
        if !has_explicit_node && nodes.len() <= CANONICAL_LEVELS.len() {
            for (i, node) in nodes.iter_mut().enumerate() {
                if !explicit[i] {
                    node.level = CANONICAL_LEVELS[i];
                }
            }
        }

        Ok(Self { nodes })
    }

    pub fn nodes(&self) -> &[SchemeNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Bind `value` on the first node labelled with `level`.
    fn bind(&mut self, level: SchemeLevel, value: u32) -> &mut Self {
        if let Some(node) = self.nodes.iter_mut().find(|node| node.level == level) {
            node.value = Some(value);
        }
        self
    }

    pub fn set_coin_type(&mut self, value: u32) -> &mut Self {
        self.bind(SchemeLevel::CoinType, value)
    }

    pub fn set_account_index(&mut self, value: u32) -> &mut Self {
        self.bind(SchemeLevel::AccountIndex, value)
    }

    pub fn set_node(&mut self, value: u32) -> &mut Self {
        self.bind(SchemeLevel::Node, value)
    }

    pub fn set_address_index(&mut self, value: u32) -> &mut Self {
        self.bind(SchemeLevel::AddressIndex, value)
    }

    /// Bound value of the first node labelled with `level`, if any.
    pub fn value_for(&self, level: SchemeLevel) -> Option<u32> {
        self.nodes
            .iter()
            .find(|node| node.level == level)
            .and_then(|node| node.value)
    }

    /// Sub-scheme starting at the first node labelled with `level`.
    ///
    /// Returns the scheme unchanged when the level is absent.
    pub fn scheme_from(&self, level: SchemeLevel) -> Self {
        match self.nodes.iter().position(|node| node.level == level) {
            Some(start) => Self {
                nodes: self.nodes[start..].to_vec(),
            },
            None => self.clone(),
        }
    }

    /// Sub-scheme ending at (and including) the first node labelled with `level`.
    ///
    /// Returns the scheme unchanged when the level is absent.
    pub fn scheme_to(&self, level: SchemeLevel) -> Self {
        match self.nodes.iter().position(|node| node.level == level) {
            Some(end) => Self {
                nodes: self.nodes[..=end].to_vec(),
            },
            None => self.clone(),
        }
    }

    /// Sub-scheme of the first `depth` nodes.
    pub fn scheme_to_depth(&self, depth: usize) -> Self {
        Self {
            nodes: self.nodes[..depth.min(self.nodes.len())].to_vec(),
        }
    }

    /// Drop the first `count` nodes.
    pub fn shift(&self, count: usize) -> Self {
        Self {
            nodes: self.nodes[count.min(self.nodes.len())..].to_vec(),
        }
    }

    /// Fold the bound nodes into a concrete path. Unbound placeholders
    /// contribute zero.
    pub fn to_path(&self) -> DerivationPath {
        let segments = self
            .nodes
            .iter()
            .map(|node| {
                let value = node.value.unwrap_or(0);
                if node.hardened {
                    value | DerivationPath::HARDENED_BIT
                } else {
                    value
                }
            })
            .collect();
        DerivationPath::new(segments)
    }
}

fn parse_node(token: &str, position: usize) -> Result<(SchemeNode, bool), SchemeError> {
    let (body, hardened) = match token.strip_suffix('\'') {
        Some(body) => (body, true),
        None => (token, false),
    };

    let level = match body {
        "<coin_type>" => Some(SchemeLevel::CoinType),
        "<account>" => Some(SchemeLevel::AccountIndex),
        "<node>" => Some(SchemeLevel::Node),
        "<address>" => Some(SchemeLevel::AddressIndex),
        _ => None,
    };
    if let Some(level) = level {
        return Ok((
            SchemeNode {
                level,
                value: None,
                hardened,
            },
            true,
        ));
    }

    if body.starts_with('<') {
        return Err(SchemeError::Parse(format!(
            "unknown placeholder \"{token}\" at position {position}"
        )));
    }

    let value = if let Some(hex_body) = body.strip_prefix("0x") {
        u32::from_str_radix(hex_body, 16).map_err(|_| {
            SchemeError::Parse(format!("invalid hex segment \"{token}\" at position {position}"))
        })?
    } else {
        body.parse::<u32>().map_err(|_| {
            SchemeError::Parse(format!("invalid segment \"{token}\" at position {position}"))
        })?
    };

    Ok((
        SchemeNode {
            level: SchemeLevel::Undefined,
            value: Some(value),
            hardened,
        },
        false,
    ))
}

impl fmt::Display for DerivationScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, node) in self.nodes.iter().enumerate() {
            if i > 0 {
                f.write_str("/")?;
            }
            match node.value {
                Some(value) => write!(f, "{value}")?,
                None => f.write_str(node.level.token())?,
            }
            if node.hardened {
                f.write_str("'")?;
            }
        }
        Ok(())
    }
}

impl FromStr for DerivationScheme {
    type Err = SchemeError;

    fn from_str(s: &str) -> Result<Self, SchemeError> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BIP44: &str = "44'/<coin_type>'/<account>'/<node>/<address>";

    fn levels(scheme: &DerivationScheme) -> Vec<SchemeLevel> {
        scheme.nodes().iter().map(|node| node.level).collect()
    }

    #[test]
    fn bind_and_fold_into_path() {
        let mut scheme = DerivationScheme::parse(BIP44).unwrap();
        let path = scheme
            .set_coin_type(0)
            .set_account_index(1)
            .set_node(1)
            .set_address_index(42)
            .to_path();
        assert_eq!(path.to_string(), "44'/0'/1'/1/42");
    }

    #[test]
    fn display_keeps_placeholder_tokens() {
        let scheme = DerivationScheme::parse(BIP44).unwrap();
        assert_eq!(scheme.to_string(), BIP44);
    }

    #[test]
    fn slice_to_level_is_inclusive() {
        let scheme = DerivationScheme::parse(BIP44).unwrap();
        assert_eq!(
            scheme.scheme_to(SchemeLevel::AccountIndex).to_string(),
            "44'/<coin_type>'/<account>'"
        );
    }

    #[test]
    fn slice_from_level() {
        let scheme = DerivationScheme::parse(BIP44).unwrap();
        assert_eq!(
            scheme.scheme_from(SchemeLevel::Node).to_string(),
            "<node>/<address>"
        );
    }

    #[test]
    fn slice_on_missing_level_returns_whole_scheme() {
        let scheme = DerivationScheme::parse("<node>/<address>").unwrap();
        assert_eq!(scheme.scheme_to(SchemeLevel::CoinType), scheme);
        assert_eq!(scheme.scheme_from(SchemeLevel::CoinType), scheme);
    }

    #[test]
    fn shift_drops_leading_nodes() {
        let scheme = DerivationScheme::parse(BIP44).unwrap();
        assert_eq!(scheme.shift(1).to_string(), "<coin_type>'/<account>'/<node>/<address>");
        assert_eq!(scheme.shift(3).to_string(), "<node>/<address>");
        assert!(scheme.shift(9).is_empty());
    }

    #[test]
    fn scheme_to_depth() {
        let scheme = DerivationScheme::parse(BIP44).unwrap();
        assert_eq!(scheme.scheme_to_depth(2).to_string(), "44'/<coin_type>'");
    }

    #[test]
    fn setters_bind_first_matching_level_only() {
        let mut scheme = DerivationScheme::parse("<address>/<address>").unwrap();
        scheme.set_address_index(7);
        assert_eq!(scheme.to_string(), "7/<address>");
    }

    #[test]
    fn unknown_placeholder_is_a_parse_error() {
        assert!(matches!(
            DerivationScheme::parse("44'/<purpose>'"),
            Err(SchemeError::Parse(_))
        ));
    }

    // The positional fallback labelling below is intentionally pinned for
    // every length it applies to; the behavior is order- and count-dependent.

    #[test]
    fn fallback_labelling_length_1() {
        let scheme = DerivationScheme::parse("0'").unwrap();
        assert_eq!(levels(&scheme), vec![SchemeLevel::Undefined]);
    }

    #[test]
    fn fallback_labelling_length_2() {
        let scheme = DerivationScheme::parse("44'/0'").unwrap();
        assert_eq!(
            levels(&scheme),
            vec![SchemeLevel::Undefined, SchemeLevel::CoinType]
        );
    }

    #[test]
    fn fallback_labelling_length_3() {
        let scheme = DerivationScheme::parse("44'/0'/0'").unwrap();
        assert_eq!(
            levels(&scheme),
            vec![
                SchemeLevel::Undefined,
                SchemeLevel::CoinType,
                SchemeLevel::AccountIndex,
            ]
        );
    }

    #[test]
    fn fallback_labelling_length_4() {
        let scheme = DerivationScheme::parse("44'/0'/0'/0").unwrap();
        assert_eq!(
            levels(&scheme),
            vec![
                SchemeLevel::Undefined,
                SchemeLevel::CoinType,
                SchemeLevel::AccountIndex,
                SchemeLevel::Node,
            ]
        );
    }

    #[test]
    fn fallback_labelling_length_5() {
        let scheme = DerivationScheme::parse("44'/0'/0'/0/0").unwrap();
        assert_eq!(
            levels(&scheme),
            vec![
                SchemeLevel::Undefined,
                SchemeLevel::CoinType,
                SchemeLevel::AccountIndex,
                SchemeLevel::Node,
                SchemeLevel::AddressIndex,
            ]
        );
        // A literal five-level scheme accepts the level setters.
        let mut scheme = scheme;
        scheme.set_address_index(9);
        assert_eq!(scheme.to_path().to_string(), "44'/0'/0'/0/9");
    }

    #[test]
    fn fallback_skips_explicitly_labelled_positions() {
        let scheme = DerivationScheme::parse("<account>'/0/1").unwrap();
        assert_eq!(
            levels(&scheme),
            vec![
                SchemeLevel::AccountIndex,
                SchemeLevel::CoinType,
                SchemeLevel::AccountIndex,
            ]
        );
    }

    #[test]
    fn no_fallback_beyond_five_segments() {
        let scheme = DerivationScheme::parse("44'/0'/0'/0/0/0").unwrap();
        assert!(levels(&scheme)
            .iter()
            .all(|level| *level == SchemeLevel::Undefined));
    }

    #[test]
    fn no_fallback_when_node_is_explicit() {
        let scheme = DerivationScheme::parse("44'/0'/<node>").unwrap();
        assert_eq!(
            levels(&scheme),
            vec![
                SchemeLevel::Undefined,
                SchemeLevel::Undefined,
                SchemeLevel::Node,
            ]
        );
    }
}
