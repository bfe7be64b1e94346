//! How a mapped column is written as an RDF term

use crate::rdf::{NamespaceManager, XSD_NS};
use std::fmt;

/// Value format of a mapped column
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueFormat {
    /// Object is a URI or a blank node (`_:` prefix)
    Resource,
    /// Language-tagged string
    TranslatableLiteral,
    /// Plain literal with no datatype or language
    Literal,
    /// Literal with the given datatype IRI
    Typed(String),
}

impl ValueFormat {
    /// Parse a configured format key: `resource`, `t_literal`, `literal`, or a
    /// datatype IRI (compact forms such as `xsd:integer` are expanded)
    pub fn parse(raw: &str, namespaces: &NamespaceManager) -> Self {
        match raw {
            "resource" => ValueFormat::Resource,
            "t_literal" => ValueFormat::TranslatableLiteral,
            "literal" | "" => ValueFormat::Literal,
            other => ValueFormat::Typed(namespaces.resolve(other)),
        }
    }

    /// Datatype IRI of typed formats
    pub fn datatype(&self) -> Option<&str> {
        match self {
            ValueFormat::Typed(dt) => Some(dt),
            _ => None,
        }
    }

    /// Typed with an XSD local name, e.g. `is_xsd("dateTime")`
    pub fn is_xsd(&self, local: &str) -> bool {
        self.datatype()
            .and_then(|dt| dt.strip_prefix(XSD_NS))
            .map_or(false, |l| l == local)
    }
}

impl fmt::Display for ValueFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueFormat::Resource => write!(f, "resource"),
            ValueFormat::TranslatableLiteral => write!(f, "t_literal"),
            ValueFormat::Literal => write!(f, "literal"),
            ValueFormat::Typed(dt) => write!(f, "{}", dt),
        }
    }
}
