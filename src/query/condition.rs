//! Entity query conditions
//!
//! Conditions are grouped with AND/OR and compiled into graph patterns over
//! `?entity`. Field values are encoded through the [`ValueCodec`], so a
//! condition matches exactly what a save would have written.

use super::builder::{QueryBuildError, QueryBuildResult};
use crate::entity::FieldValue;
use crate::mapping::{EntityTypeMapping, ValueCodec};
use crate::rdf::{RdfTerm, RDF_LANG_STRING, XSD_STRING};
use crate::sparql::SparqlArg;
use std::fmt;
use std::str::FromStr;

/// Condition operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    In,
    NotIn,
    Lt,
    Gt,
    Le,
    Ge,
    Contains,
    StartsWith,
    EndsWith,
    Exists,
    NotExists,
}

impl Operator {
    fn is_list(self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    fn is_comparison(self) -> bool {
        matches!(self, Operator::Lt | Operator::Gt | Operator::Le | Operator::Ge)
    }

    fn symbol(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Le => "<=",
            Operator::Ge => ">=",
            Operator::Contains => "CONTAINS",
            Operator::StartsWith => "STRSTARTS",
            Operator::EndsWith => "STRENDS",
            Operator::Exists => "EXISTS",
            Operator::NotExists => "NOT EXISTS",
        }
    }
}

impl FromStr for Operator {
    type Err = QueryBuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_uppercase().as_str() {
            "=" => Operator::Eq,
            "!=" | "<>" => Operator::NotEq,
            "IN" => Operator::In,
            "NOT IN" => Operator::NotIn,
            "<" => Operator::Lt,
            ">" => Operator::Gt,
            "<=" => Operator::Le,
            ">=" => Operator::Ge,
            "CONTAINS" => Operator::Contains,
            "STARTS_WITH" => Operator::StartsWith,
            "ENDS_WITH" => Operator::EndsWith,
            "EXISTS" | "IS NOT NULL" => Operator::Exists,
            "NOT EXISTS" | "IS NULL" => Operator::NotExists,
            other => return Err(QueryBuildError::UnsupportedOperator(other.to_string())),
        })
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Conjunction {
    #[default]
    And,
    Or,
}

/// One condition or a nested group
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Field {
        field: String,
        column: Option<String>,
        operator: Operator,
        /// A list for IN/NOT IN, ignored by EXISTS/NOT EXISTS
        value: FieldValue,
        langcode: Option<String>,
    },
    Group(ConditionGroup),
}

/// AND/OR group of conditions
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConditionGroup {
    conjunction: Conjunction,
    conditions: Vec<Condition>,
}

impl ConditionGroup {
    pub fn and() -> Self {
        Self::default()
    }

    pub fn or() -> Self {
        Self {
            conjunction: Conjunction::Or,
            conditions: Vec::new(),
        }
    }

    pub fn conjunction(&self) -> Conjunction {
        self.conjunction
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Add a field condition; `field.column` addresses a specific column
    pub fn condition(mut self, field: &str, value: impl Into<FieldValue>, operator: Operator) -> Self {
        self.push(field, value.into(), operator, None);
        self
    }

    /// Field condition restricted to values in one language
    pub fn condition_lang(
        mut self,
        field: &str,
        value: impl Into<FieldValue>,
        operator: Operator,
        langcode: &str,
    ) -> Self {
        self.push(field, value.into(), operator, Some(langcode.to_string()));
        self
    }

    pub fn exists(mut self, field: &str) -> Self {
        self.push(field, FieldValue::Null, Operator::Exists, None);
        self
    }

    pub fn not_exists(mut self, field: &str) -> Self {
        self.push(field, FieldValue::Null, Operator::NotExists, None);
        self
    }

    pub fn group(mut self, group: ConditionGroup) -> Self {
        self.conditions.push(Condition::Group(group));
        self
    }

    pub(crate) fn push(&mut self, field: &str, value: FieldValue, operator: Operator, langcode: Option<String>) {
        let (field, column) = match field.split_once('.') {
            Some((field, column)) => (field.to_string(), Some(column.to_string())),
            None => (field.to_string(), None),
        };
        self.conditions.push(Condition::Field {
            field,
            column,
            operator,
            value,
            langcode,
        });
    }

    pub(crate) fn compile(&self, ctx: &mut CompileContext<'_>) -> QueryBuildResult<String> {
        let parts = self
            .conditions
            .iter()
            .map(|c| match c {
                Condition::Field {
                    field,
                    column,
                    operator,
                    value,
                    langcode,
                } => ctx.field(field, column.as_deref(), *operator, value, langcode.as_deref()),
                Condition::Group(group) => group.compile(ctx),
            })
            .collect::<QueryBuildResult<Vec<_>>>()?;

        Ok(match self.conjunction {
            Conjunction::And => parts
                .into_iter()
                .filter(|p| !p.is_empty())
                .collect::<Vec<_>>()
                .join("\n"),
            // every branch binds ?entity itself; a lone FILTER would see it unbound
            Conjunction::Or => {
                let bundle_path = ctx.bundle_path()?;
                parts
                    .iter()
                    .map(|p| {
                        let var = ctx.next_var();
                        if p.is_empty() {
                            format!("{{\n?entity {} {} .\n}}", bundle_path, var)
                        } else {
                            format!("{{\n?entity {} {} .\n{}\n}}", bundle_path, var, p)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(" UNION ")
            }
        })
    }
}

/// Per-query state while compiling conditions
pub(crate) struct CompileContext<'a> {
    pub entity_type: &'a str,
    pub mapping: &'a EntityTypeMapping,
    pub codec: &'a ValueCodec,
    counter: usize,
}

impl<'a> CompileContext<'a> {
    pub fn new(entity_type: &'a str, mapping: &'a EntityTypeMapping, codec: &'a ValueCodec) -> Self {
        Self {
            entity_type,
            mapping,
            codec,
            counter: 0,
        }
    }

    /// Property path matching any of the bundle predicates
    pub fn bundle_path(&self) -> QueryBuildResult<String> {
        path(self.mapping.bundle_predicates())
    }

    fn next_var(&mut self) -> String {
        self.counter += 1;
        format!("?c{}", self.counter)
    }

    fn field(
        &mut self,
        field: &str,
        column: Option<&str>,
        operator: Operator,
        value: &FieldValue,
        langcode: Option<&str>,
    ) -> QueryBuildResult<String> {
        let values = operands(field, value, operator)?;
        if field == "id" {
            return self.id(operator, &values);
        }
        if field == self.mapping.bundle_key() {
            return self.bundle(operator, &values);
        }

        let predicates = self.mapping.field_predicates(field, column, None)?;
        let path = path(&predicates)?;
        let var = self.next_var();

        match operator {
            Operator::Exists => return Ok(format!("FILTER EXISTS {{ ?entity {} {} }}", path, var)),
            Operator::NotExists => return Ok(format!("FILTER NOT EXISTS {{ ?entity {} {} }}", path, var)),
            _ => {}
        }

        let terms = values
            .iter()
            .map(|v| {
                self.codec
                    .to_outbound_term(self.entity_type, field, v, langcode, column, None)
                    .map_err(QueryBuildError::from)
            })
            .collect::<QueryBuildResult<Vec<_>>>()?;

        let mut out = format!("?entity {} {} .", path, var);
        if let Some(lang) = langcode {
            out.push_str(&format!("\nFILTER (LANG({}) = {})", var, SparqlArg::string(lang)));
        }
        out.push('\n');
        out.push_str(&filter(&var, operator, &terms));
        Ok(out)
    }

    fn id(&self, operator: Operator, values: &[FieldValue]) -> QueryBuildResult<String> {
        let ids: Vec<String> = values.iter().map(|v| v.to_lexical()).collect();
        Ok(match operator {
            Operator::Eq | Operator::In => format!("VALUES ?entity {{ {} }}", SparqlArg::uris(&ids, " ")?),
            Operator::NotEq | Operator::NotIn => {
                format!("FILTER (?entity NOT IN ({}))", SparqlArg::uris(&ids, ", ")?)
            }
            Operator::Exists => String::new(),
            op if op.is_comparison() => format!(
                "FILTER (STR(?entity) {} {})",
                op.symbol(),
                SparqlArg::string(&ids[0])
            ),
            op @ (Operator::Contains | Operator::StartsWith | Operator::EndsWith) => format!(
                "FILTER ({}(STR(?entity), {}))",
                op.symbol(),
                SparqlArg::string(&ids[0])
            ),
            op => {
                return Err(QueryBuildError::InvalidCondition {
                    field: "id".to_string(),
                    message: format!("operator {} is not supported", op),
                })
            }
        })
    }

    fn bundle(&mut self, operator: Operator, values: &[FieldValue]) -> QueryBuildResult<String> {
        let types = values
            .iter()
            .map(|v| -> QueryBuildResult<String> {
                Ok(self.mapping.bundle_rdf_type(&v.to_lexical())?.to_string())
            })
            .collect::<QueryBuildResult<Vec<_>>>()?;
        let var = self.next_var();
        let pattern = format!("?entity {} {} .", self.bundle_path()?, var);
        Ok(match operator {
            Operator::Eq | Operator::In => {
                format!("{}\nVALUES {} {{ {} }}", pattern, var, SparqlArg::uris(&types, " ")?)
            }
            Operator::NotEq | Operator::NotIn => format!(
                "FILTER NOT EXISTS {{ ?entity {} {} . FILTER ({} IN ({})) }}",
                self.bundle_path()?,
                var,
                var,
                SparqlArg::uris(&types, ", ")?
            ),
            op => {
                return Err(QueryBuildError::InvalidCondition {
                    field: self.mapping.bundle_key().to_string(),
                    message: format!("operator {} is not supported", op),
                })
            }
        })
    }
}

/// The values an operator works on; lists only for IN/NOT IN
fn operands(field: &str, value: &FieldValue, operator: Operator) -> QueryBuildResult<Vec<FieldValue>> {
    match (operator, value) {
        (Operator::Exists | Operator::NotExists, _) => Ok(Vec::new()),
        (op, FieldValue::Array(values)) if op.is_list() => {
            if values.is_empty() {
                Err(QueryBuildError::InvalidCondition {
                    field: field.to_string(),
                    message: format!("{} needs at least one value", op),
                })
            } else {
                Ok(values.clone())
            }
        }
        (op, _) if op.is_list() => Ok(vec![value.clone()]),
        (op, FieldValue::Array(_)) => Err(QueryBuildError::InvalidCondition {
            field: field.to_string(),
            message: format!("{} takes a single value", op),
        }),
        (_, FieldValue::Null) => Err(QueryBuildError::InvalidCondition {
            field: field.to_string(),
            message: "null value; use EXISTS or NOT EXISTS".to_string(),
        }),
        _ => Ok(vec![value.clone()]),
    }
}

fn path(predicates: &[String]) -> QueryBuildResult<String> {
    match predicates {
        [] => Err(QueryBuildError::InvalidCondition {
            field: String::new(),
            message: "no predicate mapped".to_string(),
        }),
        [single] => Ok(SparqlArg::uri(single)?),
        many => Ok(format!("({})", SparqlArg::uris(many, "|")?)),
    }
}

/// Typed non-string literal: compared by value rather than lexical form
fn is_typed(term: &RdfTerm) -> bool {
    matches!(term, RdfTerm::Literal(l) if l.datatype() != XSD_STRING && l.datatype() != RDF_LANG_STRING)
}

fn filter(var: &str, operator: Operator, terms: &[RdfTerm]) -> String {
    let by_value = operator.is_comparison() && terms.iter().all(is_typed);
    let lexical = !by_value && terms.iter().any(|t| t.is_literal());
    let lhs = if lexical { format!("STR({})", var) } else { var.to_string() };
    let rendered: Vec<String> = terms
        .iter()
        .map(|t| match t {
            RdfTerm::Literal(l) if lexical => SparqlArg::string(l.value()),
            other => SparqlArg::term(other),
        })
        .collect();

    match operator {
        Operator::In | Operator::NotIn => {
            format!("FILTER ({} {} ({}))", lhs, operator.symbol(), rendered.join(", "))
        }
        Operator::Contains | Operator::StartsWith | Operator::EndsWith => format!(
            "FILTER ({}(STR({}), {}))",
            operator.symbol(),
            var,
            SparqlArg::string(terms[0].value())
        ),
        _ => format!("FILTER ({} {} {})", lhs, operator.symbol(), rendered[0]),
    }
}
