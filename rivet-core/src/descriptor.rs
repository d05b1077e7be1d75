// rivet-core/src/descriptor.rs
//! Builds a `ModuleDescriptor` from an Ivy-style module descriptor.
//!
//! ```xml
//! <ivy-module version="2.0">
//!   <info organisation="org" module="mod" revision="1.0" status="release"
//!         publication="20050220143015"/>
//!   <publications>
//!     <artifact name="mod" type="jar" ext="jar"/>
//!   </publications>
//!   <dependencies>
//!     <dependency org="other" name="lib" rev="2.1" changing="true"/>
//!   </dependencies>
//! </ivy-module>
//! ```

use rivet_common::error::{Result, RivetError};
use rivet_common::model::{
    Artifact, DependencyDescriptor, DependencyFlags, ModuleDescriptor, ModuleRevisionId,
};
use rivet_net::xml::{Attributes, ContentHandler, ValidationProblem, XmlIngestor};
use tracing::{debug, warn};
use url::Url;

const ROOT_ELEMENT: &str = "ivy-module";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Outside,
    Module,
    Publications,
    Dependencies,
}

/// Content handler collecting one module descriptor.
///
/// Validation errors do not stop the parse; they are kept and turned into a
/// `ParseError` by [`finish`](Self::finish).
#[derive(Debug)]
pub struct ModuleDescriptorParser {
    source: String,
    section: Section,
    depth: usize,
    id: Option<ModuleRevisionId>,
    status: Option<String>,
    publication: Option<String>,
    artifacts: Vec<(String, String, String)>,
    dependencies: Vec<DependencyDescriptor>,
    problems: Vec<String>,
    warnings: Vec<String>,
}

impl ModuleDescriptorParser {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            section: Section::Outside,
            depth: 0,
            id: None,
            status: None,
            publication: None,
            artifacts: Vec::new(),
            dependencies: Vec::new(),
            problems: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.problems
    }

    pub fn finish(self) -> Result<ModuleDescriptor> {
        if !self.problems.is_empty() {
            return Err(RivetError::ParseError(self.source, self.problems.join("; ")));
        }
        let id = self.id.ok_or_else(|| {
            RivetError::ParseError(self.source.clone(), "no <info> element".to_string())
        })?;

        let publication = self
            .publication
            .as_deref()
            .map(ModuleDescriptor::parse_publication)
            .transpose()
            .map_err(|e| RivetError::ParseError(self.source.clone(), e.to_string()))?;

        let artifacts = self
            .artifacts
            .into_iter()
            .map(|(name, kind, ext)| Artifact::new(id.clone(), name, kind, ext))
            .collect();

        Ok(ModuleDescriptor {
            status: self.status,
            publication,
            dependencies: self.dependencies,
            artifacts,
            id,
        })
    }

    fn read_info(&mut self, attributes: &Attributes) -> Result<()> {
        let organisation = attributes
            .get("organisation")
            .or_else(|| attributes.get("organization"));
        let (Some(organisation), Some(module)) = (organisation, attributes.get("module")) else {
            return Err(RivetError::Handler(format!(
                "{}: <info> needs organisation and module",
                self.source
            )));
        };
        let revision = attributes.get("revision").unwrap_or("working");
        self.id = Some(ModuleRevisionId::new(organisation, module, revision));
        self.status = attributes.get("status").map(str::to_string);
        self.publication = attributes.get("publication").map(str::to_string);
        Ok(())
    }

    fn read_artifact(&mut self, attributes: &Attributes) -> Result<()> {
        let name = match (attributes.get("name"), &self.id) {
            (Some(name), _) => name.to_string(),
            (None, Some(id)) => id.name.clone(),
            (None, None) => {
                return Err(RivetError::Handler(format!(
                    "{}: <artifact> before <info>",
                    self.source
                )))
            }
        };
        let kind = attributes.get("type").unwrap_or("jar").to_string();
        let ext = attributes.get("ext").map_or_else(|| kind.clone(), str::to_string);
        self.artifacts.push((name, kind, ext));
        Ok(())
    }

    fn read_dependency(&mut self, attributes: &Attributes) -> Result<()> {
        let organisation = attributes
            .get("org")
            .map(str::to_string)
            .or_else(|| self.id.as_ref().map(|id| id.organisation.clone()));
        let (Some(organisation), Some(name), Some(rev)) =
            (organisation, attributes.get("name"), attributes.get("rev"))
        else {
            return Err(RivetError::Handler(format!(
                "{}: <dependency> needs org, name and rev",
                self.source
            )));
        };

        let mut flags = DependencyFlags::empty();
        flags.set(DependencyFlags::FORCE, flag(attributes, "force", false));
        flags.set(DependencyFlags::CHANGING, flag(attributes, "changing", false));
        flags.set(DependencyFlags::TRANSITIVE, flag(attributes, "transitive", true));
        self.dependencies.push(DependencyDescriptor::new_with_flags(
            ModuleRevisionId::new(organisation, name, rev),
            flags,
        ));
        Ok(())
    }
}

fn flag(attributes: &Attributes, name: &str, default: bool) -> bool {
    attributes
        .get(name)
        .map_or(default, |v| v.trim().eq_ignore_ascii_case("true"))
}

impl ContentHandler for ModuleDescriptorParser {
    fn start_element(&mut self, name: &str, attributes: &Attributes) -> Result<()> {
        self.depth += 1;
        match (self.section, self.depth, name) {
            (Section::Outside, 1, ROOT_ELEMENT) => self.section = Section::Module,
            (Section::Outside, 1, other) => {
                return Err(RivetError::Handler(format!(
                    "{}: expected <{ROOT_ELEMENT}>, found <{other}>",
                    self.source
                )))
            }
            (Section::Module, 2, "info") => self.read_info(attributes)?,
            (Section::Module, 2, "publications") => self.section = Section::Publications,
            (Section::Module, 2, "dependencies") => self.section = Section::Dependencies,
            (Section::Publications, 3, "artifact") => self.read_artifact(attributes)?,
            (Section::Dependencies, 3, "dependency") => self.read_dependency(attributes)?,
            (_, _, other) => debug!("{}: ignoring <{}>", self.source, other),
        }
        Ok(())
    }

    fn end_element(&mut self, _name: &str) -> Result<()> {
        if self.depth == 2 && matches!(self.section, Section::Publications | Section::Dependencies) {
            self.section = Section::Module;
        }
        self.depth = self.depth.saturating_sub(1);
        Ok(())
    }

    fn warning(&mut self, problem: &ValidationProblem) {
        debug!("{}", problem);
        self.warnings.push(problem.to_string());
    }

    fn error(&mut self, problem: &ValidationProblem) {
        warn!("{}", problem);
        self.problems.push(problem.to_string());
    }

    fn fatal_error(&mut self, problem: &ValidationProblem) {
        warn!("{}", problem);
    }
}

/// Fetches `url` and parses it as a module descriptor, validating against
/// `schema` when one is given and validation is still available.
pub fn parse_descriptor(
    ingestor: &XmlIngestor,
    url: &Url,
    schema: Option<&Url>,
) -> Result<ModuleDescriptor> {
    let mut parser = ModuleDescriptorParser::new(url.as_str());
    ingestor.parse_url(url, schema, &mut parser, None)?;
    parser.finish()
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use rivet_common::config::Config;
    use rivet_net::http::UrlHandler;

    use super::*;

    fn ingestor() -> XmlIngestor {
        let config = Config::from_lookup(|_| None).unwrap();
        XmlIngestor::new(Arc::new(UrlHandler::new(&config).unwrap()))
    }

    fn parse(doc: &str) -> Result<ModuleDescriptor> {
        let mut parser = ModuleDescriptorParser::new("test.xml");
        ingestor().parse_stream(&mut Cursor::new(doc), "test.xml", None, &mut parser, None)?;
        parser.finish()
    }

    #[test]
    fn test_full_descriptor() {
        let md = parse(
            r#"<ivy-module version="2.0">
                <info organisation="org" module="mod" revision="1.0" status="release"
                      publication="20050220143015"/>
                <publications>
                    <artifact name="mod" type="jar" ext="jar"/>
                    <artifact name="mod-sources" type="source"/>
                </publications>
                <dependencies>
                    <dependency org="other" name="lib" rev="2.1" changing="true"/>
                    <dependency name="sibling" rev="1.0" transitive="false" force="true"/>
                </dependencies>
            </ivy-module>"#,
        )
        .unwrap();

        assert_eq!(md.id, ModuleRevisionId::new("org", "mod", "1.0"));
        assert_eq!(md.status.as_deref(), Some("release"));
        assert!(md.publication.is_some());
        assert_eq!(md.artifacts.len(), 2);
        assert_eq!(md.artifacts[1].ext, "source");

        let lib = &md.dependencies[0];
        assert_eq!(lib.requested(), &ModuleRevisionId::new("other", "lib", "2.1"));
        assert!(lib.is_changing() && lib.is_transitive() && !lib.is_forced());

        let sibling = &md.dependencies[1];
        assert_eq!(sibling.requested().organisation, "org");
        assert!(sibling.is_forced() && !sibling.is_transitive());
    }

    #[test]
    fn test_wrong_root_is_rejected() {
        assert!(matches!(
            parse("<project><info organisation='o' module='m'/></project>"),
            Err(RivetError::Handler(_))
        ));
    }

    #[test]
    fn test_missing_info_is_a_parse_error() {
        assert!(matches!(
            parse("<ivy-module/>"),
            Err(RivetError::ParseError(source, _)) if source == "test.xml"
        ));
    }

    #[test]
    fn test_bad_publication_date() {
        let result = parse(
            "<ivy-module><info organisation='o' module='m' revision='1' publication='yesterday'/></ivy-module>",
        );
        assert!(matches!(result, Err(RivetError::ParseError(_, _))));
    }

    #[test]
    fn test_collected_errors_fail_finish() {
        let mut parser = ModuleDescriptorParser::new("x.xml");
        parser
            .start_element(ROOT_ELEMENT, &Attributes::new())
            .unwrap();
        parser.error(&ValidationProblem::new(
            rivet_net::xml::Severity::Error,
            "unexpected element 'bogus'",
            3,
            "x.xml",
        ));
        assert_eq!(parser.errors().len(), 1);
        assert!(matches!(parser.finish(), Err(RivetError::ParseError(_, m)) if m.contains("bogus")));
    }
}
