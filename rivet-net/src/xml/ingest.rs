// rivet-net/src/xml/ingest.rs
//! Descriptor ingestion: open, optionally validate, stream into a handler.
//!
//! Validation problems never fail a parse; they reach the handler's
//! `warning` / `error` callbacks. Only malformed input, I/O failures and
//! engine construction failures are returned as errors.

use std::io::{BufReader, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rivet_common::error::{Result, RivetError};
use tracing::{debug, warn};
use url::Url;

use super::engine::{EngineError, ParserEngine, QuickXmlEngine, XmlParser, W3C_XML_SCHEMA};
use super::handler::{ContentHandler, LexicalHandler};
use crate::http::DescriptorSource;

static GLOBAL_CAPABILITY: ValidationCapability = ValidationCapability::new();

/// Whether schema validation can still be attempted. Once switched off it
/// stays off for the life of the process.
#[derive(Debug)]
pub struct ValidationCapability {
    available: AtomicBool,
}

impl ValidationCapability {
    pub const fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
        }
    }

    pub fn global() -> &'static ValidationCapability {
        &GLOBAL_CAPABILITY
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Switches validation off. Returns true only for the call that did it.
    pub fn downgrade(&self, reason: &str) -> bool {
        let switched = self.available.swap(false, Ordering::SeqCst);
        if switched {
            warn!(
                "Problem while configuring the validating XML parser, XML validation will not be done: {}",
                reason
            );
        }
        switched
    }
}

impl Default for ValidationCapability {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct XmlIngestor {
    source: Arc<dyn DescriptorSource>,
    engine: Arc<dyn ParserEngine>,
    capability: &'static ValidationCapability,
}

impl XmlIngestor {
    pub fn new(source: Arc<dyn DescriptorSource>) -> Self {
        Self {
            source,
            engine: Arc::new(QuickXmlEngine),
            capability: ValidationCapability::global(),
        }
    }

    pub fn with_engine(mut self, engine: Arc<dyn ParserEngine>) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_capability(mut self, capability: &'static ValidationCapability) -> Self {
        self.capability = capability;
        self
    }

    pub fn source(&self) -> &Arc<dyn DescriptorSource> {
        &self.source
    }

    pub fn can_use_schema_validation(&self) -> bool {
        self.capability.is_available()
    }

    /// Opens `url` through the descriptor source and parses it.
    pub fn parse_url(
        &self,
        url: &Url,
        schema: Option<&Url>,
        handler: &mut dyn ContentHandler,
        lexical: Option<&mut dyn LexicalHandler>,
    ) -> Result<()> {
        let mut stream = self.source.open_stream(url)?;
        self.parse_stream(&mut stream, url.as_str(), schema, handler, lexical)
    }

    /// Parses an already open stream. The caller keeps ownership of it.
    pub fn parse_stream(
        &self,
        stream: &mut dyn Read,
        system_id: &str,
        schema: Option<&Url>,
        handler: &mut dyn ContentHandler,
        lexical: Option<&mut dyn LexicalHandler>,
    ) -> Result<()> {
        let parser = self.new_parser(schema)?;
        let lexical = match lexical {
            Some(lexical) if parser.supports_lexical_events() => Some(lexical),
            Some(_) => {
                debug!("Parser engine has no lexical events, continuing without the lexical handler");
                None
            }
            None => None,
        };
        let mut input = BufReader::new(stream);
        debug!("Parsing {}", system_id);
        parser.parse(&mut input, system_id, handler, lexical)
    }

    fn new_parser(&self, schema: Option<&Url>) -> Result<Box<dyn XmlParser>> {
        let construction = |e: EngineError| RivetError::ParserConfig(e.to_string());
        let Some(schema) = schema.filter(|_| self.capability.is_available()) else {
            return self.engine.new_parser().map_err(construction);
        };

        // A missing schema is a broken setup, not a missing descriptor.
        let mut schema_stream = self.source.open_stream(schema).map_err(|e| match e {
            RivetError::NotFound(_) => {
                RivetError::IoError(format!("Schema {schema} could not be opened: not found"))
            }
            other => other,
        })?;
        match self
            .engine
            .new_validating_parser(W3C_XML_SCHEMA, &mut schema_stream)
        {
            Ok(parser) => {
                debug!("Validating against {}", schema);
                Ok(parser)
            }
            Err(EngineError::NotRecognized(reason)) => {
                self.capability.downgrade(&reason);
                self.engine.new_parser().map_err(construction)
            }
            Err(EngineError::InvalidSchema(reason)) => {
                Err(RivetError::ParseError(schema.to_string(), reason))
            }
            Err(e) => Err(construction(e)),
        }
    }
}
