//! Unmarshalling of eIDAS requests and responses.

use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::reader::NsReader;
use tracing::{debug, info};

use crate::error::{SamlError, SamlResult};
use crate::types::{
    AttributeDefinition, AttributeMapBuilder, AttributeRegistry, AttributeValue, AuthenticationRequest,
    AuthenticationResponse, ImmutableAttributeMap, LoaComparison, MessageFormat, SpType, Status,
    EIDAS_NS, SAMLP_NS,
};

/// Maximum length of a message ID.
pub const MAX_ID_LENGTH: usize = 256;

/// Maximum length of an issuer.
pub const MAX_ISSUER_LENGTH: usize = 1024;

/// Element being read, with its resolved namespace.
struct Frame {
    name: String,
    namespace: Option<String>,
}

/// Thin wrapper over [`NsReader`] tracking the open elements and the text of
/// the innermost one.
///
/// Elements or text after the document element are an error.
struct ElementReader<'a> {
    reader: NsReader<&'a [u8]>,
    stack: Vec<Frame>,
    text: String,
    root_closed: bool,
}

enum Step<'a> {
    Open(BytesStart<'a>, bool),
    Close(String),
    Done,
}

impl<'a> ElementReader<'a> {
    fn new(xml: &'a str) -> Self {
        Self {
            reader: NsReader::from_str(xml),
            stack: Vec::new(),
            text: String::new(),
            root_closed: false,
        }
    }

    fn depth(&self) -> usize {
        self.stack.len()
    }

    fn parent(&self) -> Option<&str> {
        self.stack
            .len()
            .checked_sub(2)
            .and_then(|i| self.stack.get(i))
            .map(|frame| frame.name.as_str())
    }

    fn inside(&self, name: &str) -> bool {
        self.stack.iter().any(|frame| frame.name == name)
    }

    fn namespace_of(&self, name: &str) -> Option<&str> {
        self.stack
            .iter()
            .rev()
            .find(|frame| frame.name == name)
            .and_then(|frame| frame.namespace.as_deref())
    }

    /// Advances to the next start, empty or end tag.
    ///
    /// An empty tag is reported as `Open(_, true)` and leaves the stack
    /// unchanged once the caller is done with it.
    fn next(&mut self) -> SamlResult<Step<'a>> {
        loop {
            let (ns, event) = self.reader.read_resolved_event()?;
            let namespace = match ns {
                ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
                _ => None,
            };
            match event {
                Event::Start(_) | Event::Empty(_) | Event::CData(_) if self.root_closed => {
                    return Err(trailing_content());
                }
                Event::Start(e) => {
                    self.text.clear();
                    self.stack.push(Frame {
                        name: local_name(&e),
                        namespace,
                    });
                    return Ok(Step::Open(e, false));
                }
                Event::Empty(e) => {
                    self.text.clear();
                    self.stack.push(Frame {
                        name: local_name(&e),
                        namespace,
                    });
                    return Ok(Step::Open(e, true));
                }
                Event::Text(t) => {
                    let text = t.unescape()?;
                    if self.root_closed && !text.trim().is_empty() {
                        return Err(trailing_content());
                    }
                    self.text.push_str(&text);
                }
                Event::CData(c) => self.text.push_str(&String::from_utf8_lossy(&c)),
                Event::End(_) => {
                    let frame = self
                        .stack
                        .pop()
                        .ok_or_else(|| SamlError::XmlParse("unbalanced end tag".to_string()))?;
                    self.root_closed = self.stack.is_empty();
                    return Ok(Step::Close(frame.name));
                }
                Event::Eof => return Ok(Step::Done),
                _ => {}
            }
        }
    }

    /// Pops the frame of an empty element after it has been handled.
    fn close_empty(&mut self) {
        self.stack.pop();
        self.root_closed = self.stack.is_empty();
    }

    fn take_text(&mut self) -> String {
        std::mem::take(&mut self.text).trim().to_string()
    }
}

fn trailing_content() -> SamlError {
    SamlError::XmlParse("content after the document element".to_string())
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attribute(e: &BytesStart<'_>, name: &str) -> SamlResult<Option<String>> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == name.as_bytes() {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

fn parse_instant(value: Option<String>) -> SamlResult<DateTime<Utc>> {
    match value {
        Some(raw) => DateTime::parse_from_rfc3339(raw.trim())
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| SamlError::XmlParse(format!("IssueInstant: {e}"))),
        None => Ok(Utc::now()),
    }
}

fn check_identity(id: &str, issuer: &str) -> SamlResult<()> {
    if id.is_empty() {
        return Err(SamlError::MissingElement("ID".to_string()));
    }
    if id.len() > MAX_ID_LENGTH {
        return Err(SamlError::InvalidRequest(format!(
            "ID exceeds {MAX_ID_LENGTH} characters"
        )));
    }
    if issuer.is_empty() {
        return Err(SamlError::MissingElement("Issuer".to_string()));
    }
    if issuer.len() > MAX_ISSUER_LENGTH {
        return Err(SamlError::InvalidRequest(format!(
            "Issuer exceeds {MAX_ISSUER_LENGTH} characters"
        )));
    }
    Ok(())
}

/// A requested or released attribute being read.
struct PendingAttribute {
    definition: Option<AttributeDefinition>,
    values: Vec<String>,
    requested: bool,
}

impl PendingAttribute {
    fn open(e: &BytesStart<'_>, registry: &AttributeRegistry, requested: bool) -> SamlResult<Self> {
        let name = attribute(e, "Name")?
            .ok_or_else(|| SamlError::MissingElement("Attribute Name".to_string()))?;
        let definition = registry.get(&name).cloned();
        if definition.is_none() {
            info!(attribute = %name, "ignoring unknown attribute");
        }
        let definition = match (definition, requested) {
            (Some(definition), true) => {
                let required = attribute(e, "isRequired")?.is_some_and(|v| v.trim() == "true");
                Some(definition.with_required(required))
            }
            (definition, _) => definition,
        };
        Ok(Self {
            definition,
            values: Vec::new(),
            requested,
        })
    }

    fn finish(self, builder: &mut AttributeMapBuilder) -> SamlResult<()> {
        let Some(definition) = self.definition else {
            return Ok(());
        };
        let values = self
            .values
            .iter()
            .map(|value| definition.unmarshal(value))
            .collect::<SamlResult<Vec<AttributeValue>>>()
            .map_err(|e| {
                if self.requested {
                    SamlError::InvalidRequest(e.to_string())
                } else {
                    SamlError::InvalidResponse(e.to_string())
                }
            })?;
        let current = std::mem::take(builder);
        *builder = current.put(definition, values);
        Ok(())
    }
}

/// Unmarshals an `AuthnRequest`.
///
/// Requested attributes unknown to `registry` are dropped. The message
/// format is taken from the namespace of the request extensions.
///
/// # Errors
///
/// Returns a message class [`SamlError`] if the XML is malformed, is not an
/// `AuthnRequest`, or lacks its ID or issuer.
pub fn parse_authn_request(
    xml: &str,
    registry: &AttributeRegistry,
) -> SamlResult<AuthenticationRequest> {
    let mut reader = ElementReader::new(xml);

    let mut request: Option<AuthenticationRequest> = None;
    let mut issue_instant = None;
    let mut issuer = String::new();
    let mut extensions_namespace: Option<String> = None;
    let mut attributes = ImmutableAttributeMap::builder();
    let mut pending: Option<PendingAttribute> = None;
    let mut levels: Vec<String> = Vec::new();
    let mut comparison = LoaComparison::Minimum;

    loop {
        match reader.next()? {
            Step::Open(e, empty) => {
                let name = local_name(&e);
                let depth = reader.depth();

                if depth == 1 {
                    if name != "AuthnRequest" || reader.namespace_of(&name) != Some(SAMLP_NS) {
                        return Err(SamlError::InvalidRequest(format!(
                            "expected AuthnRequest, found {name}"
                        )));
                    }
                    let mut parsed = AuthenticationRequest::new(
                        attribute(&e, "ID")?.unwrap_or_default(),
                        String::new(),
                    );
                    parsed.destination = attribute(&e, "Destination")?;
                    parsed.assertion_consumer_service_url =
                        attribute(&e, "AssertionConsumerServiceURL")?;
                    parsed.binding = attribute(&e, "ProtocolBinding")?;
                    parsed.provider_name = attribute(&e, "ProviderName")?;
                    issue_instant = attribute(&e, "IssueInstant")?;
                    request = Some(parsed);
                } else if reader.parent() == Some("Extensions") && extensions_namespace.is_none() {
                    extensions_namespace = reader.namespace_of(&name).map(str::to_string);
                }

                match name.as_str() {
                    "RequestedAttribute" if reader.inside("Extensions") => {
                        pending = Some(PendingAttribute::open(&e, registry, true)?);
                    }
                    "NameIDPolicy" => {
                        if let Some(request) = request.as_mut() {
                            request.name_id_format = attribute(&e, "Format")?;
                        }
                    }
                    "RequestedAuthnContext" => {
                        if let Some(value) = attribute(&e, "Comparison")? {
                            comparison = value.trim().parse().map_err(SamlError::InvalidRequest)?;
                        }
                    }
                    _ => {}
                }

                if empty {
                    if name == "RequestedAttribute" {
                        if let Some(done) = pending.take() {
                            done.finish(&mut attributes)?;
                        }
                    }
                    reader.close_empty();
                }
            }
            Step::Close(name) => {
                let depth = reader.depth();
                match name.as_str() {
                    "Issuer" if depth == 1 => issuer = reader.take_text(),
                    "SPType" => {
                        let value = reader.take_text();
                        let sp_type: SpType = value.parse().map_err(SamlError::InvalidRequest)?;
                        if let Some(request) = request.as_mut() {
                            request.sp_type = Some(sp_type);
                        }
                    }
                    "RequesterID" => {
                        let value = reader.take_text();
                        if let Some(request) = request.as_mut() {
                            if !value.is_empty() {
                                request.requester_id = Some(value);
                            }
                        }
                    }
                    "AuthnContextClassRef" => {
                        let value = reader.take_text();
                        if !value.is_empty() {
                            levels.push(value);
                        }
                    }
                    "AttributeValue" => {
                        let value = reader.take_text();
                        if let Some(pending) = pending.as_mut() {
                            pending.values.push(value);
                        }
                    }
                    "RequestedAttribute" => {
                        if let Some(done) = pending.take() {
                            done.finish(&mut attributes)?;
                        }
                    }
                    _ => {}
                }
            }
            Step::Done => break,
        }
    }

    let mut request =
        request.ok_or_else(|| SamlError::XmlParse("empty document".to_string()))?;
    check_identity(&request.id, &issuer)?;
    request.issuer = issuer;
    request.issue_instant = parse_instant(issue_instant)?;

    let message_format = match extensions_namespace.as_deref() {
        None | Some(EIDAS_NS) => MessageFormat::Eidas,
        Some(other) => MessageFormat::Unsupported(other.to_string()),
    };
    debug!(request_id = %request.id, format = ?message_format, "unmarshalled request");

    Ok(request
        .with_requested_attributes(attributes.build())
        .with_levels_of_assurance(levels, comparison)
        .with_message_format(message_format))
}

/// Unmarshals a `Response`, including the attributes of its assertion.
///
/// # Errors
///
/// Returns a message class [`SamlError`] if the XML is malformed, is not a
/// `Response`, or an attribute value does not fit its definition.
pub fn parse_response(xml: &str, registry: &AttributeRegistry) -> SamlResult<AuthenticationResponse> {
    let mut reader = ElementReader::new(xml);

    let mut response: Option<AuthenticationResponse> = None;
    let mut issue_instant = None;
    let mut status_codes: Vec<String> = Vec::new();
    let mut status_message = None;
    let mut attributes = ImmutableAttributeMap::builder();
    let mut pending: Option<PendingAttribute> = None;
    let mut name_id_format = None;

    loop {
        match reader.next()? {
            Step::Open(e, empty) => {
                let name = local_name(&e);
                if reader.depth() == 1 {
                    if name != "Response" || reader.namespace_of(&name) != Some(SAMLP_NS) {
                        return Err(SamlError::InvalidResponse(format!(
                            "expected Response, found {name}"
                        )));
                    }
                    let mut parsed = AuthenticationResponse::success(
                        attribute(&e, "InResponseTo")?.unwrap_or_default(),
                        String::new(),
                    );
                    parsed.id = attribute(&e, "ID")?.unwrap_or_default();
                    parsed.destination = attribute(&e, "Destination")?;
                    parsed.consent = attribute(&e, "Consent")?;
                    issue_instant = attribute(&e, "IssueInstant")?;
                    response = Some(parsed);
                }

                match name.as_str() {
                    "StatusCode" => {
                        if let Some(value) = attribute(&e, "Value")? {
                            status_codes.push(value);
                        }
                    }
                    "NameID" => name_id_format = attribute(&e, "Format")?,
                    "SubjectConfirmationData" | "SubjectLocality" => {
                        if let (Some(response), Some(address)) =
                            (response.as_mut(), attribute(&e, "Address")?)
                        {
                            response.ip_address.get_or_insert(address);
                        }
                    }
                    "Attribute" if reader.inside("AttributeStatement") => {
                        pending = Some(PendingAttribute::open(&e, registry, false)?);
                    }
                    _ => {}
                }

                if empty {
                    if name == "Attribute" {
                        if let Some(done) = pending.take() {
                            done.finish(&mut attributes)?;
                        }
                    }
                    reader.close_empty();
                }
            }
            Step::Close(name) => {
                let depth = reader.depth();
                let Some(current) = response.as_mut() else {
                    continue;
                };
                match name.as_str() {
                    "Issuer" if depth == 1 => current.issuer = reader.take_text(),
                    "StatusMessage" => status_message = Some(reader.take_text()),
                    "NameID" => {
                        current.subject = Some(reader.take_text());
                        current.subject_name_id_format = name_id_format.take();
                    }
                    "Audience" => current.audience = Some(reader.take_text()),
                    "AuthnContextClassRef" => {
                        current.level_of_assurance = Some(reader.take_text());
                    }
                    "AttributeValue" => {
                        let value = reader.take_text();
                        if let Some(pending) = pending.as_mut() {
                            pending.values.push(value);
                        }
                    }
                    "Attribute" => {
                        if let Some(done) = pending.take() {
                            done.finish(&mut attributes)?;
                        }
                    }
                    _ => {}
                }
            }
            Step::Done => break,
        }
    }

    let mut response =
        response.ok_or_else(|| SamlError::XmlParse("empty document".to_string()))?;
    check_identity(&response.id, &response.issuer)?;
    response.issue_instant = parse_instant(issue_instant)?;

    let mut codes = status_codes.into_iter();
    let top = codes
        .next()
        .ok_or_else(|| SamlError::MissingElement("StatusCode".to_string()))?;
    response.status = Status {
        status_code: top,
        sub_status_code: codes.next(),
        status_message: status_message.filter(|m| !m.is_empty()),
    };

    Ok(response.with_attributes(attributes.build()))
}
