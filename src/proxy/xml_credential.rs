//! XML-credential (bango-style) backend adapter
//!
//! The caller sends a complete XML document with placeholder credential
//! elements; the adapter fills in the configured username and password and
//! forwards the document to the URL named in the request's URL header.
//!
//! The document is streamed event by event, so anything the adapter does not
//! touch is written back as it was read.

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use quick_xml::writer::Writer;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::{BangoConfig, HeaderNames};
use crate::error::{Error, Result};
use crate::models::{InboundRequest, OutboundCall};
use crate::proxy::core::{BackendAdapter, Route};

pub const XML_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Credential {
    Username,
    Password,
}

/// Scan progress over one document
#[derive(Debug, Default)]
struct Scan {
    username_set: bool,
    password_set: bool,
    depth: usize,
    roots: usize,
    // Replaced elements drop their existing leading text
    skipping_text: bool,
}

impl Scan {
    fn finished(&self) -> bool {
        self.username_set && self.password_set
    }

    fn mark(&mut self, credential: Credential) {
        match credential {
            Credential::Username => self.username_set = true,
            Credential::Password => self.password_set = true,
        }
    }

    fn open_root(&mut self) -> Result<()> {
        if self.depth == 0 {
            self.roots += 1;
            if self.roots > 1 {
                return Err(malformed("multiple root elements"));
            }
        }
        Ok(())
    }
}

/// Substitutes configured credentials into the XML body
pub struct XmlCredentialAdapter {
    route: Route,
    timeout: Duration,
    username: String,
    password: String,
    namespaces: Vec<String>,
    username_tag: String,
    password_tag: String,
}

impl XmlCredentialAdapter {
    pub fn new(headers: &HeaderNames, config: &BangoConfig) -> Self {
        Self {
            route: Route::Direct {
                url_header: headers.url.clone(),
            },
            timeout: config.timeout(),
            username: config.username.clone(),
            password: config.password.clone(),
            namespaces: config.namespaces.clone(),
            username_tag: config.username_tag.clone(),
            password_tag: config.password_tag.clone(),
        }
    }

    fn credential_for(&self, namespace: &ResolveResult, local_name: &[u8]) -> Option<Credential> {
        let uri = match namespace {
            ResolveResult::Bound(Namespace(uri)) => *uri,
            _ => return None,
        };
        if !self.namespaces.iter().any(|ns| ns.as_bytes() == uri) {
            return None;
        }

        if local_name == self.username_tag.as_bytes() {
            Some(Credential::Username)
        } else if local_name == self.password_tag.as_bytes() {
            Some(Credential::Password)
        } else {
            None
        }
    }

    fn value_for(&self, credential: Credential) -> &str {
        match credential {
            Credential::Username => &self.username,
            Credential::Password => &self.password,
        }
    }

    /// Rewrite `body`, returning the new document and whether anything changed
    fn rewrite(&self, body: &[u8]) -> Result<(Vec<u8>, bool)> {
        let mut reader = NsReader::from_reader(body);
        let mut writer = Writer::new(Vec::with_capacity(body.len()));
        let mut buf = Vec::new();
        let mut scan = Scan::default();

        loop {
            buf.clear();
            let (namespace, event) = reader
                .read_resolved_event_into(&mut buf)
                .map_err(|e| malformed(e.to_string()))?;

            let credential = match &event {
                Event::Start(e) | Event::Empty(e) => {
                    if let ResolveResult::Unknown(prefix) = &namespace {
                        return Err(unbound_prefix(prefix));
                    }
                    if scan.finished() {
                        None
                    } else {
                        self.credential_for(&namespace, e.local_name().as_ref())
                    }
                }
                _ => None,
            };

            match &event {
                Event::Start(e) | Event::Empty(e) => check_element(&reader, e)?,
                Event::Text(t) => {
                    t.unescape().map_err(|e| malformed(format!("invalid text: {}", e)))?;
                }
                _ => {}
            }

            if scan.skipping_text {
                if matches!(event, Event::Text(_) | Event::CData(_)) {
                    continue;
                }
                scan.skipping_text = false;
            }

            match event {
                Event::Start(e) => {
                    scan.open_root()?;
                    scan.depth += 1;
                    write(&mut writer, Event::Start(e))?;
                    if let Some(credential) = credential {
                        write(&mut writer, Event::Text(BytesText::new(self.value_for(credential))))?;
                        scan.mark(credential);
                        scan.skipping_text = true;
                    }
                }
                Event::Empty(e) => {
                    scan.open_root()?;
                    match credential {
                        Some(credential) => {
                            let end = e.to_end().into_owned();
                            write(&mut writer, Event::Start(e))?;
                            write(&mut writer, Event::Text(BytesText::new(self.value_for(credential))))?;
                            write(&mut writer, Event::End(end))?;
                            scan.mark(credential);
                        }
                        None => write(&mut writer, Event::Empty(e))?,
                    }
                }
                Event::End(e) => {
                    scan.depth = scan
                        .depth
                        .checked_sub(1)
                        .ok_or_else(|| malformed("unexpected closing tag"))?;
                    write(&mut writer, Event::End(e))?;
                }
                Event::Text(t) => {
                    if scan.depth == 0 && !t.iter().all(u8::is_ascii_whitespace) {
                        return Err(malformed("text outside the root element"));
                    }
                    write(&mut writer, Event::Text(t))?;
                }
                Event::CData(c) => {
                    if scan.depth == 0 {
                        return Err(malformed("CDATA outside the root element"));
                    }
                    write(&mut writer, Event::CData(c))?;
                }
                Event::Eof => break,
                other => write(&mut writer, other)?,
            }
        }

        if scan.depth != 0 {
            return Err(malformed("unclosed element at end of document"));
        }
        if scan.roots == 0 {
            return Err(malformed("no root element"));
        }

        let changed = scan.username_set || scan.password_set;
        debug!(
            username_set = scan.username_set,
            password_set = scan.password_set,
            "Credential scan finished"
        );
        Ok((writer.into_inner(), changed))
    }
}

impl BackendAdapter for XmlCredentialAdapter {
    fn name(&self) -> &'static str {
        "bango"
    }

    fn route(&self) -> &Route {
        &self.route
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn prepare(&self, inbound: &InboundRequest, url: &str) -> Result<OutboundCall> {
        let (body, changed) = self.rewrite(inbound.body())?;
        if !changed {
            info!("Did not set a username or password on the request");
        }

        Ok(OutboundCall {
            url: url.to_string(),
            headers: HashMap::from([("Content-Type".to_string(), XML_CONTENT_TYPE.to_string())]),
            body: body.into(),
            timeout: self.timeout,
        })
    }
}

fn malformed(reason: impl Into<String>) -> Error {
    Error::MalformedBody(reason.into())
}

fn unbound_prefix(prefix: &[u8]) -> Error {
    malformed(format!(
        "unbound namespace prefix '{}'",
        String::from_utf8_lossy(prefix)
    ))
}

/// Checks the reader leaves to the caller: name syntax, attribute syntax and
/// uniqueness, attribute escapes and attribute prefixes
fn check_element(reader: &NsReader<&[u8]>, start: &BytesStart<'_>) -> Result<()> {
    let name = start.name();
    if !is_valid_name(name.as_ref()) {
        return Err(malformed(format!(
            "invalid element name '{}'",
            String::from_utf8_lossy(name.as_ref())
        )));
    }

    for attr in start.attributes() {
        let attr = attr.map_err(|e| malformed(format!("invalid attribute: {}", e)))?;
        if !is_valid_name(attr.key.as_ref()) {
            return Err(malformed(format!(
                "invalid attribute name '{}'",
                String::from_utf8_lossy(attr.key.as_ref())
            )));
        }
        attr.unescape_value()
            .map_err(|e| malformed(format!("invalid attribute value: {}", e)))?;

        let predeclared = attr
            .key
            .prefix()
            .is_some_and(|prefix| prefix.as_ref() == b"xml");
        if attr.key.as_namespace_binding().is_none() && !predeclared {
            if let (ResolveResult::Unknown(prefix), _) = reader.resolve_attribute(attr.key) {
                return Err(unbound_prefix(&prefix));
            }
        }
    }

    Ok(())
}

/// XML Name with at most one prefix separator
fn is_valid_name(name: &[u8]) -> bool {
    let Ok(name) = std::str::from_utf8(name) else {
        return false;
    };
    name.split(':').count() <= 2 && name.split(':').all(is_valid_ncname)
}

fn is_valid_ncname(part: &str) -> bool {
    let mut chars = part.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '-' | '.' | '_') || !c.is_ascii())
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| malformed(format!("failed to serialize document: {}", e)))
}
