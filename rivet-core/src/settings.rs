// rivet-core/src/settings.rs
//! Declarative resolver settings and the named-resolver registry built from them.
//!
//! ```toml
//! validate = true
//! default_resolver = "main"
//!
//! [[credentials]]
//! realm = "Private Repo"
//! host = "repo.example.com"
//! username = "alice"
//! password = "secret"
//!
//! [[resolvers]]
//! kind = "repository"
//! name = "local"
//! artifact_pattern = "file:///repo/[organisation]/[module]/[type]s/[artifact]-[revision].[ext]"
//!
//! [[resolvers]]
//! kind = "dual"
//! name = "main"
//! metadata = "local"
//! artifact = "remote"
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use rivet_common::config::Config;
use rivet_common::credentials::{CredentialEntry, CredentialStore};
use rivet_common::error::{Result, RivetError};
use rivet_net::auth::{InstallOutcome, RivetAuthenticator};
use rivet_net::http::UrlHandler;
use rivet_net::validation::validate_url;
use rivet_net::xml::XmlIngestor;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::resolver::{ChainResolver, DualResolver, RepositoryResolver, ResolverRef};

fn default_true() -> bool {
    true
}

/// On-disk form of the settings file.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsFile {
    #[serde(default = "default_true")]
    pub validate: bool,
    #[serde(default)]
    pub default_resolver: Option<String>,
    #[serde(default)]
    pub credentials: Vec<CredentialEntry>,
    #[serde(default)]
    pub resolvers: Vec<ResolverDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResolverDefinition {
    Repository {
        name: String,
        #[serde(default)]
        descriptor_pattern: Option<String>,
        artifact_pattern: String,
        #[serde(default)]
        schema: Option<String>,
    },
    Dual {
        name: String,
        #[serde(default)]
        metadata: Option<String>,
        #[serde(default)]
        artifact: Option<String>,
    },
    Chain {
        name: String,
        #[serde(default)]
        resolvers: Vec<String>,
    },
}

impl ResolverDefinition {
    pub fn name(&self) -> &str {
        match self {
            Self::Repository { name, .. } | Self::Dual { name, .. } | Self::Chain { name, .. } => {
                name
            }
        }
    }
}

/// Named resolvers plus the settings every resolve shares.
#[derive(Debug)]
pub struct ResolverSettings {
    validate: bool,
    default_resolver: Option<String>,
    resolvers: HashMap<String, ResolverRef>,
    order: Vec<String>,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            validate: true,
            default_resolver: None,
            resolvers: HashMap::new(),
            order: Vec::new(),
        }
    }
}

impl ResolverSettings {
    /// Parses settings text, loads its credentials into `store` and builds
    /// every declared resolver on top of `ingestor`.
    pub fn from_toml_str(
        raw: &str,
        ingestor: &XmlIngestor,
        store: &CredentialStore,
    ) -> Result<Self> {
        let file: SettingsFile = toml::from_str(raw)?;
        store.load_from(&file.credentials);
        Self::from_file(file, ingestor)
    }

    pub fn load(path: &Path, ingestor: &XmlIngestor, store: &CredentialStore) -> Result<Self> {
        debug!("Loading resolver settings from {}", path.display());
        let raw = fs::read_to_string(path).map_err(|e| {
            RivetError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&raw, ingestor, store)
    }

    /// Wires the process-wide pieces from `config`: credentials go into the
    /// global store, the authenticator bridge is installed, and the settings
    /// file is loaded when it exists.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store = CredentialStore::global();
        store.load_from(&config.credentials);

        if RivetAuthenticator::install_default(config.proxy_settings()) == InstallOutcome::Refused {
            warn!("Continuing without repository authentication");
        }

        let ingestor = XmlIngestor::new(Arc::new(UrlHandler::new(config)?));
        let mut settings = if config.settings_path().exists() {
            Self::load(config.settings_path(), &ingestor, &store)?
        } else {
            debug!(
                "No settings file at {}, starting without resolvers",
                config.settings_path().display()
            );
            Self::default()
        };
        settings.validate &= config.validate;
        Ok(settings)
    }

    fn from_file(file: SettingsFile, ingestor: &XmlIngestor) -> Result<Self> {
        let mut definitions: HashMap<&str, &ResolverDefinition> = HashMap::new();
        for definition in &file.resolvers {
            if definitions.insert(definition.name(), definition).is_some() {
                return Err(RivetError::Config(format!(
                    "resolver '{}' is defined more than once",
                    definition.name()
                )));
            }
        }

        let mut registry = RegistryBuilder {
            definitions,
            ingestor,
            built: HashMap::new(),
            in_progress: Vec::new(),
        };
        let mut settings = Self {
            validate: file.validate,
            ..Self::default()
        };
        for definition in &file.resolvers {
            let resolver = registry.build(definition.name(), None)?;
            settings.add_resolver(resolver)?;
        }

        if let Some(name) = file.default_resolver {
            if !settings.resolvers.contains_key(&name) {
                return Err(RivetError::Config(format!(
                    "default resolver '{name}' is not defined"
                )));
            }
            settings.default_resolver = Some(name);
        }
        debug!("Built {} resolvers", settings.order.len());
        Ok(settings)
    }

    /// Registers a resolver under its own name.
    pub fn add_resolver(&mut self, resolver: ResolverRef) -> Result<()> {
        let name = resolver.name().to_string();
        if self.resolvers.contains_key(&name) {
            return Err(RivetError::Config(format!(
                "a resolver named '{name}' is already registered"
            )));
        }
        self.order.push(name.clone());
        self.resolvers.insert(name, resolver);
        Ok(())
    }

    pub fn set_default_resolver(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if !self.resolvers.contains_key(&name) {
            return Err(RivetError::Config(format!("unknown resolver '{name}'")));
        }
        self.default_resolver = Some(name);
        Ok(())
    }

    pub fn resolver(&self, name: &str) -> Option<&ResolverRef> {
        self.resolvers.get(name)
    }

    pub fn default_resolver(&self) -> Option<&ResolverRef> {
        self.default_resolver
            .as_deref()
            .and_then(|name| self.resolvers.get(name))
    }

    /// Names in declaration order.
    pub fn resolver_names(&self) -> &[String] {
        &self.order
    }

    pub fn validate(&self) -> bool {
        self.validate
    }

    pub fn set_validate(&mut self, validate: bool) {
        self.validate = validate;
    }
}

/// Builds resolvers depth-first so references can point forward.
struct RegistryBuilder<'a> {
    definitions: HashMap<&'a str, &'a ResolverDefinition>,
    ingestor: &'a XmlIngestor,
    built: HashMap<String, ResolverRef>,
    in_progress: Vec<String>,
}

impl RegistryBuilder<'_> {
    fn build(&mut self, name: &str, referenced_by: Option<&str>) -> Result<ResolverRef> {
        if let Some(resolver) = self.built.get(name) {
            return Ok(Arc::clone(resolver));
        }
        if self.in_progress.iter().any(|n| n == name) {
            let mut cycle = self.in_progress.clone();
            cycle.push(name.to_string());
            return Err(RivetError::Config(format!(
                "resolver cycle: {}",
                cycle.join(" -> ")
            )));
        }
        let definition = *self.definitions.get(name).ok_or_else(|| match referenced_by {
            Some(parent) => {
                RivetError::Config(format!("resolver '{parent}' references unknown resolver '{name}'"))
            }
            None => RivetError::Config(format!("unknown resolver '{name}'")),
        })?;

        self.in_progress.push(name.to_string());
        let resolver = self.build_definition(definition);
        self.in_progress.pop();

        let resolver = resolver?;
        self.built.insert(name.to_string(), Arc::clone(&resolver));
        Ok(resolver)
    }

    fn build_definition(&mut self, definition: &ResolverDefinition) -> Result<ResolverRef> {
        match definition {
            ResolverDefinition::Repository {
                name,
                descriptor_pattern,
                artifact_pattern,
                schema,
            } => {
                let mut builder = RepositoryResolver::builder(name.as_str(), self.ingestor.clone())
                    .artifact_pattern(artifact_pattern.as_str());
                if let Some(pattern) = descriptor_pattern {
                    builder = builder.descriptor_pattern(pattern.as_str());
                }
                if let Some(schema) = schema {
                    builder = builder.schema(validate_url(schema)?);
                }
                Ok(builder.build()? as ResolverRef)
            }
            ResolverDefinition::Dual {
                name,
                metadata,
                artifact,
            } => {
                let metadata = metadata.as_deref().ok_or_else(|| {
                    RivetError::Config(format!(
                        "dual resolver '{name}' needs a metadata resolver"
                    ))
                })?;
                let metadata = self.build(metadata, Some(name.as_str()))?;
                let mut builder = DualResolver::builder(name.as_str()).metadata_resolver(metadata);
                if let Some(artifact) = artifact {
                    let artifact = self.build(artifact, Some(name.as_str()))?;
                    builder = builder.artifact_resolver(artifact);
                }
                Ok(builder.build() as ResolverRef)
            }
            ResolverDefinition::Chain { name, resolvers } => {
                let mut builder = ChainResolver::builder(name.as_str());
                for member in resolvers {
                    builder = builder.add(self.build(member, Some(name.as_str()))?);
                }
                Ok(builder.build() as ResolverRef)
            }
        }
    }
}
