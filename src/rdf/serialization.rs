//! N-Triples and Turtle reading/writing through rio

use super::types::{
    BlankNode, Literal, NamedNode, RdfError, RdfResult, RdfSubject, RdfTerm, Triple, XSD_STRING,
};
use rio_api::formatter::TriplesFormatter;
use rio_api::model;
use rio_api::parser::TriplesParser;
use rio_turtle::{NTriplesFormatter, NTriplesParser, TurtleError, TurtleFormatter, TurtleParser};
use std::io::{BufReader, Cursor};

/// Supported triple serializations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdfFormat {
    NTriples,
    Turtle,
}

impl RdfFormat {
    /// Media type used for content negotiation
    pub fn media_type(&self) -> &'static str {
        match self {
            RdfFormat::NTriples => "application/n-triples",
            RdfFormat::Turtle => "text/turtle",
        }
    }

    /// Guess the format from a Content-Type header value
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        let essence = media_type.split(';').next().unwrap_or("").trim();
        match essence {
            "application/n-triples" | "text/plain" => Some(RdfFormat::NTriples),
            "text/turtle" | "application/x-turtle" => Some(RdfFormat::Turtle),
            _ => None,
        }
    }
}

/// Parse a document into triples
pub fn parse(format: RdfFormat, input: &str) -> RdfResult<Vec<Triple>> {
    let mut reader = BufReader::new(Cursor::new(input));
    let mut triples = Vec::new();

    let mut on_triple = |t: model::Triple<'_>| -> Result<(), TurtleError> {
        let triple = convert_triple(t)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        triples.push(triple);
        Ok(())
    };

    let res = match format {
        RdfFormat::NTriples => NTriplesParser::new(&mut reader).parse_all(&mut on_triple),
        RdfFormat::Turtle => TurtleParser::new(&mut reader, None).parse_all(&mut on_triple),
    };

    res.map_err(|e| RdfError::Parse(e.to_string()))?;
    Ok(triples)
}

/// Serialize triples; N-Triples output is what update bodies embed
pub fn serialize(format: RdfFormat, triples: &[Triple]) -> RdfResult<String> {
    let mut output = Vec::new();
    match format {
        RdfFormat::NTriples => {
            let mut formatter = NTriplesFormatter::new(&mut output);
            for triple in triples {
                write_triple(&mut formatter, triple)?;
            }
        }
        RdfFormat::Turtle => {
            let mut formatter = TurtleFormatter::new(&mut output);
            for triple in triples {
                write_triple(&mut formatter, triple)?;
            }
            formatter
                .finish()
                .map_err(|e| RdfError::Serialize(e.to_string()))?;
        }
    }

    String::from_utf8(output).map_err(|e| RdfError::Serialize(e.to_string()))
}

fn write_triple<F: TriplesFormatter>(formatter: &mut F, triple: &Triple) -> RdfResult<()> {
    let subject = match &triple.subject {
        RdfSubject::NamedNode(n) => model::Subject::NamedNode(model::NamedNode { iri: n.as_str() }),
        RdfSubject::BlankNode(b) => model::Subject::BlankNode(model::BlankNode { id: b.as_str() }),
    };
    let predicate = model::NamedNode {
        iri: triple.predicate.as_str(),
    };
    let object = match &triple.object {
        RdfTerm::NamedNode(n) => model::Term::NamedNode(model::NamedNode { iri: n.as_str() }),
        RdfTerm::BlankNode(b) => model::Term::BlankNode(model::BlankNode { id: b.as_str() }),
        RdfTerm::Literal(l) => model::Term::Literal(match l.language() {
            Some(language) => model::Literal::LanguageTaggedString {
                value: l.value(),
                language,
            },
            None if l.datatype() == XSD_STRING => model::Literal::Simple { value: l.value() },
            None => model::Literal::Typed {
                value: l.value(),
                datatype: model::NamedNode { iri: l.datatype() },
            },
        }),
    };

    formatter
        .format(&model::Triple {
            subject,
            predicate,
            object,
        })
        .map_err(|e| RdfError::Serialize(e.to_string()))
}

fn convert_triple(t: model::Triple<'_>) -> RdfResult<Triple> {
    let subject = match t.subject {
        model::Subject::NamedNode(n) => RdfSubject::NamedNode(NamedNode::new(n.iri)?),
        model::Subject::BlankNode(b) => RdfSubject::BlankNode(BlankNode::from_id(b.id)?),
        #[allow(unreachable_patterns)]
        _ => return Err(RdfError::Parse("Unsupported subject type".to_string())),
    };
    let predicate = NamedNode::new(t.predicate.iri)?;
    let object = match t.object {
        model::Term::NamedNode(n) => RdfTerm::NamedNode(NamedNode::new(n.iri)?),
        model::Term::BlankNode(b) => RdfTerm::BlankNode(BlankNode::from_id(b.id)?),
        model::Term::Literal(model::Literal::Simple { value }) => {
            RdfTerm::Literal(Literal::new_simple_literal(value))
        }
        model::Term::Literal(model::Literal::LanguageTaggedString { value, language }) => {
            RdfTerm::Literal(Literal::new_language_tagged_literal(value, language)?)
        }
        model::Term::Literal(model::Literal::Typed { value, datatype }) => {
            RdfTerm::Literal(Literal::new_typed_literal(value, NamedNode::new(datatype.iri)?))
        }
        #[allow(unreachable_patterns)]
        _ => return Err(RdfError::Parse("Unsupported object type".to_string())),
    };

    Ok(Triple::new(subject, predicate, object))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Triple> {
        let apple = NamedNode::new("http://ex/apple").unwrap();
        vec![
            Triple::new(
                apple.clone().into(),
                NamedNode::new("http://ex/label").unwrap(),
                Literal::new_language_tagged_literal("Apple", "en").unwrap().into(),
            ),
            Triple::new(
                apple.into(),
                NamedNode::new("http://ex/weight").unwrap(),
                Literal::new_typed_literal(
                    "150",
                    NamedNode::new("http://www.w3.org/2001/XMLSchema#integer").unwrap(),
                )
                .into(),
            ),
        ]
    }

    #[test]
    fn test_ntriples_output_is_line_based() {
        let out = serialize(RdfFormat::NTriples, &sample()).unwrap();
        assert_eq!(out.lines().count(), 2);
        assert!(out.contains("<http://ex/apple> <http://ex/label> \"Apple\"@en ."));
    }

    #[test]
    fn test_ntriples_parse_back() {
        let out = serialize(RdfFormat::NTriples, &sample()).unwrap();
        let parsed = parse(RdfFormat::NTriples, &out).unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn test_turtle_parse_with_prefixes() {
        let doc = "@prefix ex: <http://ex/> .\nex:apple ex:label \"Apple\" ; ex:color ex:red .";
        let parsed = parse(RdfFormat::Turtle, doc).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].object.value(), "http://ex/red");
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(parse(RdfFormat::NTriples, "<a> <b"), Err(RdfError::Parse(_))));
    }

    #[test]
    fn test_media_type_guess() {
        assert_eq!(
            RdfFormat::from_media_type("application/n-triples; charset=utf-8"),
            Some(RdfFormat::NTriples)
        );
        assert_eq!(RdfFormat::from_media_type("text/turtle"), Some(RdfFormat::Turtle));
        assert_eq!(RdfFormat::from_media_type("text/html"), None);
    }
}
