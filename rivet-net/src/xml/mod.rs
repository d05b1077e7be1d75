// rivet-net/src/xml/mod.rs
pub mod engine;
pub mod handler;
pub mod ingest;
pub mod schema;

pub use engine::{EngineError, ParserEngine, QuickXmlEngine, XmlParser, W3C_XML_SCHEMA};
pub use handler::{Attributes, ContentHandler, LexicalHandler, Severity, ValidationProblem};
pub use ingest::{ValidationCapability, XmlIngestor};
pub use schema::SchemaRules;
