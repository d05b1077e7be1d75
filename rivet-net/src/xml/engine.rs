// rivet-net/src/xml/engine.rs
//! Parser factories and the default streaming parser.

use std::borrow::Cow;
use std::fmt;
use std::io::{BufRead, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use rivet_common::error::{Result, RivetError};
use thiserror::Error;

use super::handler::{
    dispatch_problem, Attributes, ContentHandler, LexicalHandler, Severity, ValidationProblem,
};
use super::schema::{SchemaRules, Validator};

pub const W3C_XML_SCHEMA: &str = "http://www.w3.org/2001/XMLSchema";

#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// The engine does not understand the requested validation settings.
    #[error("property not recognized: {0}")]
    NotRecognized(String),

    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    #[error("parser construction failed: {0}")]
    Construction(String),
}

pub trait XmlParser {
    fn supports_lexical_events(&self) -> bool;

    /// Streams `input` into `handler`. Validation problems go to the handler;
    /// only malformed input, I/O failures and handler errors are returned.
    fn parse(
        &self,
        input: &mut dyn BufRead,
        system_id: &str,
        handler: &mut dyn ContentHandler,
        lexical: Option<&mut dyn LexicalHandler>,
    ) -> Result<()>;
}

pub trait ParserEngine: Send + Sync + fmt::Debug {
    fn new_parser(&self) -> std::result::Result<Box<dyn XmlParser>, EngineError>;

    fn new_validating_parser(
        &self,
        schema_language: &str,
        schema: &mut dyn Read,
    ) -> std::result::Result<Box<dyn XmlParser>, EngineError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct QuickXmlEngine;

impl ParserEngine for QuickXmlEngine {
    fn new_parser(&self) -> std::result::Result<Box<dyn XmlParser>, EngineError> {
        Ok(Box::new(QuickXmlParser { rules: None }))
    }

    fn new_validating_parser(
        &self,
        schema_language: &str,
        schema: &mut dyn Read,
    ) -> std::result::Result<Box<dyn XmlParser>, EngineError> {
        if schema_language != W3C_XML_SCHEMA {
            return Err(EngineError::NotRecognized(format!(
                "schema language '{schema_language}'"
            )));
        }
        let rules = SchemaRules::compile(schema)?;
        Ok(Box::new(QuickXmlParser { rules: Some(rules) }))
    }
}

#[derive(Debug)]
pub struct QuickXmlParser {
    rules: Option<SchemaRules>,
}

impl XmlParser for QuickXmlParser {
    fn supports_lexical_events(&self) -> bool {
        true
    }

    fn parse(
        &self,
        input: &mut dyn BufRead,
        system_id: &str,
        handler: &mut dyn ContentHandler,
        mut lexical: Option<&mut dyn LexicalHandler>,
    ) -> Result<()> {
        let mut reader = Reader::from_reader(input);
        reader.config_mut().trim_text(true);
        let mut run = Run {
            system_id,
            handler,
            validator: self.rules.as_ref().map(Validator::new),
            open: Vec::new(),
            seen_root: false,
        };

        run.handler.start_document()?;
        let mut buf = Vec::new();
        loop {
            let position = reader.buffer_position() as u64;
            let event = match reader.read_event_into(&mut buf) {
                Ok(event) => event,
                Err(quick_xml::Error::Io(e)) => {
                    return Err(RivetError::IoError(format!(
                        "Failed to read {system_id}: {e}"
                    )))
                }
                Err(e) => return Err(run.fatal(reader.error_position() as u64, e.to_string())),
            };

            match event {
                Event::Start(e) => {
                    let (name, attributes) = run.read_start(&e, position)?;
                    run.start_element(name, &attributes, position)?;
                }
                Event::Empty(e) => {
                    let (name, attributes) = run.read_start(&e, position)?;
                    run.start_element(name, &attributes, position)?;
                    run.end_element(position)?;
                }
                Event::End(_) => run.end_element(position)?,
                Event::Text(e) => {
                    let text = e.unescape().map_err(|err| run.fatal(position, err.to_string()))?;
                    run.characters(&text, position)?;
                }
                Event::CData(e) => {
                    let text = String::from_utf8_lossy(&e);
                    if let Some(lex) = lexical.as_deref_mut() {
                        lex.start_cdata();
                    }
                    run.characters(&text, position)?;
                    if let Some(lex) = lexical.as_deref_mut() {
                        lex.end_cdata();
                    }
                }
                Event::Comment(e) => {
                    if let Some(lex) = lexical.as_deref_mut() {
                        lex.comment(&String::from_utf8_lossy(&e));
                    }
                }
                Event::DocType(e) => {
                    if let Some(lex) = lexical.as_deref_mut() {
                        lex.doctype(String::from_utf8_lossy(&e).trim());
                    }
                }
                Event::Eof => {
                    if let Some(unclosed) = run.open.last() {
                        let message = format!("element '{unclosed}' is never closed");
                        return Err(run.fatal(position, message));
                    }
                    if !run.seen_root {
                        return Err(run.fatal(position, "Premature end of file.".to_string()));
                    }
                    break;
                }
                Event::Decl(_) | Event::PI(_) => {}
            }
            buf.clear();
        }
        run.handler.end_document()
    }
}

/// State of one document parse.
struct Run<'p> {
    system_id: &'p str,
    handler: &'p mut dyn ContentHandler,
    validator: Option<Validator<'p>>,
    open: Vec<String>,
    seen_root: bool,
}

impl Run<'_> {
    fn fatal(&mut self, position: u64, message: String) -> RivetError {
        let problem = ValidationProblem::new(Severity::Fatal, &message, position, self.system_id);
        self.handler.fatal_error(&problem);
        RivetError::ParseError(self.system_id.to_string(), format!("{message} (at byte {position})"))
    }

    fn report(&mut self, findings: Vec<(Severity, String)>, position: u64) {
        for (severity, message) in findings {
            let problem = ValidationProblem::new(severity, message, position, self.system_id);
            dispatch_problem(&mut *self.handler, &problem);
        }
    }

    fn read_start(&mut self, start: &BytesStart<'_>, position: u64) -> Result<(String, Attributes)> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Attributes::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| self.fatal(position, e.to_string()))?;
            let value = attr
                .unescape_value()
                .map_err(|e| self.fatal(position, e.to_string()))?;
            attributes.push(
                String::from_utf8_lossy(attr.key.as_ref()),
                value.into_owned(),
            );
        }
        Ok((name, attributes))
    }

    fn start_element(&mut self, name: String, attributes: &Attributes, position: u64) -> Result<()> {
        if self.open.is_empty() && self.seen_root {
            return Err(self.fatal(
                position,
                "The markup in the document following the root element must be well-formed."
                    .to_string(),
            ));
        }
        self.seen_root = true;
        if let Some(validator) = self.validator.as_mut() {
            let findings = validator.start_element(&name, attributes);
            self.report(findings, position);
        }
        self.handler.start_element(&name, attributes)?;
        self.open.push(name);
        Ok(())
    }

    fn end_element(&mut self, position: u64) -> Result<()> {
        let Some(name) = self.open.pop() else {
            return Err(self.fatal(position, "unexpected end tag".to_string()));
        };
        if let Some(validator) = self.validator.as_mut() {
            let findings = validator.end_element();
            self.report(findings, position);
        }
        self.handler.end_element(&name)
    }

    fn characters(&mut self, text: &Cow<'_, str>, position: u64) -> Result<()> {
        if self.open.is_empty() {
            return Err(self.fatal(
                position,
                "Content is not allowed outside the root element.".to_string(),
            ));
        }
        if let Some(validator) = self.validator.as_mut() {
            let findings = validator.characters(text);
            self.report(findings, position);
        }
        self.handler.characters(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Events {
        log: Vec<String>,
        fatal: usize,
    }

    impl ContentHandler for Events {
        fn start_element(&mut self, name: &str, attributes: &Attributes) -> Result<()> {
            let attrs: Vec<String> = attributes.iter().map(|(k, v)| format!("{k}={v}")).collect();
            self.log.push(format!("<{name} {}>", attrs.join(",")));
            Ok(())
        }

        fn end_element(&mut self, name: &str) -> Result<()> {
            self.log.push(format!("</{name}>"));
            Ok(())
        }

        fn characters(&mut self, text: &str) -> Result<()> {
            self.log.push(text.to_string());
            Ok(())
        }

        fn fatal_error(&mut self, _problem: &ValidationProblem) {
            self.fatal += 1;
        }
    }

    fn parse(doc: &str) -> (Result<()>, Events) {
        let parser = QuickXmlEngine.new_parser().unwrap();
        let mut events = Events::default();
        let result = parser.parse(&mut doc.as_bytes(), "test.xml", &mut events, None);
        (result, events)
    }

    #[test]
    fn test_event_stream() {
        let (result, events) =
            parse(r#"<?xml version="1.0"?><a x="1 &amp; 2"><b/>text<![CDATA[<raw>]]></a>"#);
        result.unwrap();
        assert_eq!(
            events.log,
            vec!["<a x=1 & 2>", "<b >", "</b>", "text", "<raw>", "</a>"]
        );
        assert_eq!(events.fatal, 0);
    }

    #[test]
    fn test_malformed_documents() {
        for doc in [
            "<a><b></a>",
            "<a>",
            "",
            "<a/><b/>",
            "<a/>trailing",
            r#"<a x="1" x="2"/>"#,
        ] {
            let (result, events) = parse(doc);
            assert!(
                matches!(result, Err(RivetError::ParseError(_, _))),
                "expected a parse error for {doc:?}"
            );
            assert_eq!(events.fatal, 1, "one fatal callback for {doc:?}");
        }
    }

    #[test]
    fn test_unknown_schema_language_not_recognized() {
        let err = QuickXmlEngine
            .new_validating_parser("http://relaxng.org/ns/structure/1.0", &mut "".as_bytes())
            .err()
            .unwrap();
        assert!(matches!(err, EngineError::NotRecognized(_)));
    }
}
