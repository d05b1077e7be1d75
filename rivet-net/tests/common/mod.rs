// rivet-net/tests/common/mod.rs

//! Shared doubles for the rivet-net integration tests.
#![allow(dead_code)]

use std::any::Any;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use rivet_net::auth::{
    AuthenticationChallenge, Authenticator, AuthenticatorSlot, PasswordAuthentication,
    RivetAuthenticator,
};
use rivet_net::http::DescriptorSource;
use rivet_net::xml::{Attributes, ContentHandler, LexicalHandler, ValidationProblem};
use rivet_net::{Result, RivetError};
use url::Url;

/// A private slot, so tests never touch the process-wide one.
pub fn leaked_slot() -> &'static AuthenticatorSlot {
    Box::leak(Box::new(AuthenticatorSlot::new()))
}

pub fn origin_challenge(host: &str, realm: &str) -> AuthenticationChallenge {
    AuthenticationChallenge::new(host, 443, "https").with_prompt(realm)
}

pub fn bridge_is_active(slot: &AuthenticatorSlot) -> bool {
    slot.current()
        .is_some_and(|a| a.as_any().is::<RivetAuthenticator>())
}

/// Stand-in for an authenticator the host environment installed earlier.
#[derive(Debug, Default)]
pub struct SystemAuthenticator {
    pub answer: Option<(&'static str, &'static str)>,
    pub panic: bool,
    pub calls: AtomicUsize,
    /// Set when, during a call, `watch` had this authenticator installed.
    pub was_active: AtomicBool,
    pub watch: Option<&'static AuthenticatorSlot>,
}

impl SystemAuthenticator {
    pub fn answering(username: &'static str, password: &'static str) -> Self {
        Self {
            answer: Some((username, password)),
            ..Default::default()
        }
    }

    pub fn watching(mut self, slot: &'static AuthenticatorSlot) -> Self {
        self.watch = Some(slot);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Authenticator for SystemAuthenticator {
    fn password_authentication(
        &self,
        _challenge: &AuthenticationChallenge,
    ) -> Option<PasswordAuthentication> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(slot) = self.watch {
            let me = slot
                .current()
                .is_some_and(|a| a.as_any().is::<SystemAuthenticator>());
            self.was_active.store(me, Ordering::SeqCst);
        }
        if self.panic {
            panic!("system authenticator failed");
        }
        self.answer
            .map(|(user, password)| PasswordAuthentication::new(user, password))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Descriptor source backed by an in-memory map keyed by URL.
#[derive(Debug, Default)]
pub struct MemorySource {
    documents: HashMap<String, Vec<u8>>,
    pub opened: Mutex<Vec<String>>,
}

impl MemorySource {
    pub fn with(mut self, url: &str, content: &str) -> Self {
        self.documents
            .insert(url.to_string(), content.as_bytes().to_vec());
        self
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl DescriptorSource for MemorySource {
    fn open_stream(&self, url: &Url) -> Result<Box<dyn Read + Send>> {
        self.opened.lock().unwrap().push(url.to_string());
        self.documents
            .get(url.as_str())
            .map(|bytes| Box::new(Cursor::new(bytes.clone())) as Box<dyn Read + Send>)
            .ok_or_else(|| RivetError::NotFound(url.to_string()))
    }
}

/// Records every callback as a line of text.
#[derive(Debug, Default)]
pub struct RecordingHandler {
    pub events: Vec<String>,
    pub warnings: Vec<ValidationProblem>,
    pub errors: Vec<ValidationProblem>,
    pub fatal: Vec<ValidationProblem>,
}

impl ContentHandler for RecordingHandler {
    fn start_document(&mut self) -> Result<()> {
        self.events.push("start-document".to_string());
        Ok(())
    }

    fn end_document(&mut self) -> Result<()> {
        self.events.push("end-document".to_string());
        Ok(())
    }

    fn start_element(&mut self, name: &str, _attributes: &Attributes) -> Result<()> {
        self.events.push(format!("<{name}>"));
        Ok(())
    }

    fn end_element(&mut self, name: &str) -> Result<()> {
        self.events.push(format!("</{name}>"));
        Ok(())
    }

    fn characters(&mut self, text: &str) -> Result<()> {
        self.events.push(text.to_string());
        Ok(())
    }

    fn warning(&mut self, problem: &ValidationProblem) {
        self.warnings.push(problem.clone());
    }

    fn error(&mut self, problem: &ValidationProblem) {
        self.errors.push(problem.clone());
    }

    fn fatal_error(&mut self, problem: &ValidationProblem) {
        self.fatal.push(problem.clone());
    }
}

#[derive(Debug, Default)]
pub struct RecordingLexical {
    pub comments: Vec<String>,
}

impl LexicalHandler for RecordingLexical {
    fn comment(&mut self, text: &str) {
        self.comments.push(text.trim().to_string());
    }
}
