//! Value codec
//!
//! Turns field column values into RDF terms and lexical values read from the
//! store back into field column values.
//!
//! Outbound order: hooks, serialization, bundle substitution, term wrapping.
//! Inbound order: hooks, deserialization or bundle reversal, data type
//! conversion.

use super::format::ValueFormat;
use super::hooks::{TimestampDateHook, ValueContext, ValueHook};
use super::registry::{BundleMatch, ColumnInfo, EntityTypeMapping, FieldMappingRegistry, MappingError};
use crate::entity::{FieldValue, LANGCODE_DEFAULT};
use crate::rdf::{BlankNode, Literal, NamedNode, RdfError, RdfTerm};
use std::sync::Arc;
use thiserror::Error;

/// Codec errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CodecError {
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("RDF error: {0}")]
    Rdf(#[from] RdfError),

    #[error("Cannot decode serialized value of '{field}': {message}")]
    Decode { field: String, message: String },

    #[error("Cannot serialize value of '{field}': {message}")]
    Encode { field: String, message: String },
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Encodes and decodes field values through the mapping registry
pub struct ValueCodec {
    registry: Arc<FieldMappingRegistry>,
    hooks: Vec<Arc<dyn ValueHook>>,
}

impl ValueCodec {
    /// Codec with the date hook installed
    pub fn new(registry: Arc<FieldMappingRegistry>) -> Self {
        Self {
            registry,
            hooks: vec![Arc::new(TimestampDateHook)],
        }
    }

    /// Codec without any hook
    pub fn bare(registry: Arc<FieldMappingRegistry>) -> Self {
        Self {
            registry,
            hooks: Vec::new(),
        }
    }

    /// Append a hook; hooks run in registration order
    pub fn with_hook(mut self, hook: Arc<dyn ValueHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn registry(&self) -> &Arc<FieldMappingRegistry> {
        &self.registry
    }

    /// Encode one column value as an RDF term
    ///
    /// Without a bundle, the first bundle mapping the field decides the format.
    /// `langcode` only matters for translatable literals; `None` or
    /// `x-default` produce an untagged literal.
    pub fn to_outbound_term(
        &self,
        entity_type: &str,
        field: &str,
        value: &FieldValue,
        langcode: Option<&str>,
        column: Option<&str>,
        bundle: Option<&str>,
    ) -> CodecResult<RdfTerm> {
        let mapping = self.registry.build(entity_type)?;
        let (bundle, column, info) = resolve(&mapping, field, column, bundle)?;
        let ctx = ValueContext {
            entity_type,
            bundle,
            field,
            column,
            langcode,
            mapping: info,
        };

        let value = self
            .hooks
            .iter()
            .fold(value.clone(), |v, hook| hook.outbound(&ctx, v));

        let mut lexical = if info.serialize {
            serde_json::to_string(&value.to_json()).map_err(|e| CodecError::Encode {
                field: field.to_string(),
                message: e.to_string(),
            })?
        } else {
            value.to_lexical()
        };

        if field == mapping.bundle_key() {
            lexical = mapping.bundle_rdf_type(&lexical)?.to_string();
        }

        wrap(&lexical, &info.format, langcode)
    }

    /// Decode one lexical value read from the store
    pub fn to_inbound_value(
        &self,
        entity_type: &str,
        field: &str,
        value: &str,
        langcode: Option<&str>,
        column: Option<&str>,
        bundle: Option<&str>,
    ) -> CodecResult<FieldValue> {
        let mapping = self.registry.build(entity_type)?;
        let (bundle, column, info) = resolve(&mapping, field, column, bundle)?;
        let ctx = ValueContext {
            entity_type,
            bundle,
            field,
            column,
            langcode,
            mapping: info,
        };

        let lexical = self
            .hooks
            .iter()
            .fold(value.to_string(), |v, hook| hook.inbound(&ctx, v));

        if info.serialize {
            let json: serde_json::Value =
                serde_json::from_str(&lexical).map_err(|e| CodecError::Decode {
                    field: field.to_string(),
                    message: e.to_string(),
                })?;
            return Ok(FieldValue::from_json(json));
        }

        if field == mapping.bundle_key() {
            return Ok(match mapping.inbound_bundle_value(&lexical) {
                BundleMatch::One(bundle) => FieldValue::String(bundle),
                _ => FieldValue::String(lexical),
            });
        }

        Ok(convert(lexical, &info.data_type))
    }
}

fn resolve<'m>(
    mapping: &'m EntityTypeMapping,
    field: &str,
    column: Option<&'m str>,
    bundle: Option<&'m str>,
) -> CodecResult<(&'m str, &'m str, &'m ColumnInfo)> {
    let bundle = match bundle {
        Some(bundle) => mapping.bundle(bundle)?,
        None => mapping
            .bundles()
            .find(|b| b.fields.contains_key(field))
            .ok_or_else(|| MappingError::UnmappedField {
                entity_type: mapping.entity_type().to_string(),
                field: field.to_string(),
            })?,
    };
    let info = mapping.field(&bundle.id, field)?;
    let column = column.unwrap_or(info.main_property.as_str());
    let column_info = mapping.column(&bundle.id, field, Some(column))?;
    Ok((bundle.id.as_str(), column, column_info))
}

fn wrap(lexical: &str, format: &ValueFormat, langcode: Option<&str>) -> CodecResult<RdfTerm> {
    let term = match format {
        ValueFormat::Resource => match lexical.strip_prefix("_:") {
            Some(id) => BlankNode::from_id(id)?.into(),
            None => NamedNode::new(lexical)?.into(),
        },
        ValueFormat::TranslatableLiteral => match langcode {
            Some(lang) if lang != LANGCODE_DEFAULT => {
                Literal::new_language_tagged_literal(lexical, lang)?.into()
            }
            _ => Literal::new_simple_literal(lexical).into(),
        },
        ValueFormat::Literal => Literal::new_simple_literal(lexical).into(),
        ValueFormat::Typed(datatype) => {
            Literal::new_typed_literal(lexical, NamedNode::new(datatype.as_str())?).into()
        }
    };
    Ok(term)
}

/// Lexical → typed value by declared column data type; unparseable input stays a string
fn convert(lexical: String, data_type: &str) -> FieldValue {
    match data_type {
        "integer" | "timestamp" => lexical
            .parse::<i64>()
            .map(FieldValue::Integer)
            .unwrap_or(FieldValue::String(lexical)),
        "float" | "decimal" => lexical
            .parse::<f64>()
            .map(FieldValue::Float)
            .unwrap_or(FieldValue::String(lexical)),
        "boolean" => match lexical.as_str() {
            "true" | "1" => FieldValue::Boolean(true),
            "false" | "0" => FieldValue::Boolean(false),
            _ => FieldValue::String(lexical),
        },
        _ => FieldValue::String(lexical),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use std::collections::BTreeMap;

    const YAML: &str = r#"
graphs:
  - id: default
entity_types:
  rdf_entity:
    base_fields:
      label:
        translatable: true
      created:
        columns:
          value:
            data_type: timestamp
    bundles:
      fruit:
        rdf_type: http://example.com/fruit
        graphs:
          default: http://example.com/fruit/published
        base_fields_mapping:
          label:
            value:
              predicate: rdfs:label
              format: t_literal
          created:
            value:
              predicate: dcterms:created
              format: xsd:dateTime
        fields:
          weight:
            columns:
              value:
                data_type: integer
            mapping:
              value:
                predicate: http://example.com/weight
                format: xsd:integer
          ripe:
            columns:
              value:
                data_type: boolean
            mapping:
              value:
                predicate: http://example.com/ripe
                format: xsd:boolean
          origin:
            mapping:
              value:
                predicate: http://example.com/origin
                format: resource
          meta:
            columns:
              value:
                data_type: blob
            mapping:
              value:
                predicate: http://example.com/meta
                serialize: true
"#;

    fn codec() -> ValueCodec {
        let config = Arc::new(EngineConfig::from_yaml_str(YAML).unwrap());
        ValueCodec::new(Arc::new(FieldMappingRegistry::new(config)))
    }

    fn round_trip(codec: &ValueCodec, field: &str, value: FieldValue, lang: Option<&str>) -> FieldValue {
        let term = codec
            .to_outbound_term("rdf_entity", field, &value, lang, None, Some("fruit"))
            .unwrap();
        codec
            .to_inbound_value("rdf_entity", field, term.value(), term.language(), None, Some("fruit"))
            .unwrap()
    }

    #[test]
    fn test_outbound_formats() {
        let codec = codec();
        let label = codec
            .to_outbound_term("rdf_entity", "label", &"Pomme".into(), Some("fr"), None, None)
            .unwrap();
        assert_eq!(label.to_string(), "\"Pomme\"@fr");

        let weight = codec
            .to_outbound_term("rdf_entity", "weight", &150.into(), None, None, Some("fruit"))
            .unwrap();
        assert_eq!(weight.to_string(), "\"150\"^^<http://www.w3.org/2001/XMLSchema#integer>");

        let origin = codec
            .to_outbound_term("rdf_entity", "origin", &"http://ex/spain".into(), None, None, None)
            .unwrap();
        assert_eq!(origin.to_string(), "<http://ex/spain>");

        let blank = codec
            .to_outbound_term("rdf_entity", "origin", &"_:b1".into(), None, None, None)
            .unwrap();
        assert!(matches!(blank, RdfTerm::BlankNode(_)));
    }

    #[test]
    fn test_bundle_key_substitution() {
        let codec = codec();
        let term = codec
            .to_outbound_term("rdf_entity", "rid", &"fruit".into(), None, None, Some("fruit"))
            .unwrap();
        assert_eq!(term.to_string(), "<http://example.com/fruit>");

        let back = codec
            .to_inbound_value("rdf_entity", "rid", term.value(), None, None, Some("fruit"))
            .unwrap();
        assert_eq!(back, FieldValue::from("fruit"));
    }

    #[test]
    fn test_round_trips() {
        let codec = codec();
        assert_eq!(round_trip(&codec, "weight", 150.into(), None), FieldValue::from(150));
        assert_eq!(round_trip(&codec, "ripe", true.into(), None), FieldValue::from(true));
        assert_eq!(round_trip(&codec, "label", "Apple".into(), Some("en")), FieldValue::from("Apple"));
        assert_eq!(
            round_trip(&codec, "created", 1_500_000_000.into(), None),
            FieldValue::from(1_500_000_000)
        );

        let mut map = BTreeMap::new();
        map.insert("ripeness".to_string(), FieldValue::from(0.8));
        map.insert("tags".to_string(), FieldValue::from(vec![FieldValue::from("red")]));
        let composite = FieldValue::Map(map);
        assert_eq!(round_trip(&codec, "meta", composite.clone(), None), composite);
    }

    #[test]
    fn test_timestamp_stored_as_datetime() {
        let term = codec()
            .to_outbound_term("rdf_entity", "created", &0.into(), None, None, None)
            .unwrap();
        assert_eq!(term.value(), "1970-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_malformed_serialized_value_fails() {
        let err = codec()
            .to_inbound_value("rdf_entity", "meta", "{not json", None, None, Some("fruit"))
            .unwrap_err();
        assert!(matches!(err, CodecError::Decode { ref field, .. } if field == "meta"));
    }

    #[test]
    fn test_unmapped_field() {
        let err = codec()
            .to_outbound_term("rdf_entity", "colour", &"red".into(), None, None, None)
            .unwrap_err();
        assert!(matches!(err, CodecError::Mapping(MappingError::UnmappedField { .. })));
    }

    #[test]
    fn test_bare_codec_skips_hooks() {
        let config = Arc::new(EngineConfig::from_yaml_str(YAML).unwrap());
        let codec = ValueCodec::bare(Arc::new(FieldMappingRegistry::new(config)));
        let term = codec
            .to_outbound_term("rdf_entity", "created", &0.into(), None, None, None)
            .unwrap();
        assert_eq!(term.value(), "0");
    }
}
