//! Marshalling of eIDAS requests and responses.

use std::fmt::Write as _;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use quick_xml::escape::escape;

use crate::error::SamlResult;
use crate::types::{
    new_id, AuthenticationRequest, AuthenticationResponse, Status, ATTRNAME_FORMAT_URI, BEARER,
    EIDAS_NS, ENTITY_FORMAT, SAMLP_NS, SAML_NS,
};

/// Lifetime of an issued assertion.
const ASSERTION_VALIDITY_MINUTES: i64 = 5;

fn instant(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn optional_attribute(out: &mut String, name: &str, value: Option<&str>) {
    if let Some(value) = value {
        let _ = write!(out, " {name}=\"{}\"", escape(value));
    }
}

/// Marshals an `AuthnRequest` in the eIDAS profile.
#[must_use]
pub fn marshal_request(request: &AuthenticationRequest) -> String {
    let mut xml = String::with_capacity(2048);
    let _ = write!(
        xml,
        r#"<saml2p:AuthnRequest xmlns:saml2p="{SAMLP_NS}" xmlns:saml2="{SAML_NS}" xmlns:eidas="{EIDAS_NS}" ID="{}" IssueInstant="{}" Version="2.0" ForceAuthn="true" IsPassive="false""#,
        escape(&request.id),
        instant(request.issue_instant),
    );
    optional_attribute(&mut xml, "Destination", request.destination.as_deref());
    optional_attribute(
        &mut xml,
        "AssertionConsumerServiceURL",
        request.assertion_consumer_service_url.as_deref(),
    );
    optional_attribute(&mut xml, "ProtocolBinding", request.binding.as_deref());
    optional_attribute(&mut xml, "ProviderName", request.provider_name.as_deref());
    xml.push('>');

    let _ = write!(
        xml,
        r#"<saml2:Issuer Format="{ENTITY_FORMAT}">{}</saml2:Issuer>"#,
        escape(&request.issuer)
    );

    xml.push_str("<saml2p:Extensions>");
    if let Some(sp_type) = request.sp_type {
        let _ = write!(xml, "<eidas:SPType>{}</eidas:SPType>", sp_type.as_str());
    }
    xml.push_str("<eidas:RequestedAttributes>");
    for (definition, values) in request.requested_attributes.iter() {
        let _ = write!(
            xml,
            r#"<eidas:RequestedAttribute FriendlyName="{}" Name="{}" NameFormat="{ATTRNAME_FORMAT_URI}" isRequired="{}""#,
            escape(&definition.friendly_name),
            escape(&definition.name_uri),
            definition.required,
        );
        if values.is_empty() {
            xml.push_str("/>");
        } else {
            xml.push('>');
            for value in values {
                let _ = write!(
                    xml,
                    "<eidas:AttributeValue>{}</eidas:AttributeValue>",
                    escape(&value.to_string())
                );
            }
            xml.push_str("</eidas:RequestedAttribute>");
        }
    }
    xml.push_str("</eidas:RequestedAttributes></saml2p:Extensions>");

    if let Some(format) = &request.name_id_format {
        let _ = write!(
            xml,
            r#"<saml2p:NameIDPolicy AllowCreate="true" Format="{}"/>"#,
            escape(format)
        );
    }

    if !request.levels_of_assurance.is_empty() {
        let _ = write!(
            xml,
            r#"<saml2p:RequestedAuthnContext Comparison="{}">"#,
            request.loa_comparison.as_str()
        );
        for loa in &request.levels_of_assurance {
            let _ = write!(
                xml,
                "<saml2:AuthnContextClassRef>{}</saml2:AuthnContextClassRef>",
                escape(loa)
            );
        }
        xml.push_str("</saml2p:RequestedAuthnContext>");
    }

    if let Some(requester_id) = &request.requester_id {
        let _ = write!(
            xml,
            "<saml2p:Scoping><saml2p:RequesterID>{}</saml2p:RequesterID></saml2p:Scoping>",
            escape(requester_id)
        );
    }

    xml.push_str("</saml2p:AuthnRequest>");
    xml
}

fn marshal_status(xml: &mut String, status: &Status) {
    let _ = write!(
        xml,
        r#"<saml2p:Status><saml2p:StatusCode Value="{}""#,
        escape(&status.status_code)
    );
    match &status.sub_status_code {
        Some(sub) => {
            let _ = write!(
                xml,
                r#"><saml2p:StatusCode Value="{}"/></saml2p:StatusCode>"#,
                escape(sub)
            );
        }
        None => xml.push_str("/>"),
    }
    if let Some(message) = &status.status_message {
        let _ = write!(
            xml,
            "<saml2p:StatusMessage>{}</saml2p:StatusMessage>",
            escape(message)
        );
    }
    xml.push_str("</saml2p:Status>");
}

/// Marshals a `Response`.
///
/// Failure responses carry only their status; success responses carry one
/// assertion with subject, conditions, authentication statement and the
/// released attributes.
///
/// # Errors
///
/// Returns [`crate::SamlError::AttributeMarshalling`] if an attribute value
/// does not match its definition.
pub fn marshal_response(response: &AuthenticationResponse) -> SamlResult<String> {
    let mut xml = String::with_capacity(4096);
    let _ = write!(
        xml,
        r#"<saml2p:Response xmlns:saml2p="{SAMLP_NS}" xmlns:saml2="{SAML_NS}" ID="{}" InResponseTo="{}" IssueInstant="{}" Version="2.0""#,
        escape(&response.id),
        escape(&response.in_response_to),
        instant(response.issue_instant),
    );
    optional_attribute(&mut xml, "Destination", response.destination.as_deref());
    optional_attribute(&mut xml, "Consent", response.consent.as_deref());
    xml.push('>');
    let _ = write!(
        xml,
        r#"<saml2:Issuer Format="{ENTITY_FORMAT}">{}</saml2:Issuer>"#,
        escape(&response.issuer)
    );
    marshal_status(&mut xml, &response.status);

    if !response.is_failure() {
        marshal_assertion(&mut xml, response)?;
    }

    xml.push_str("</saml2p:Response>");
    Ok(xml)
}

fn marshal_assertion(xml: &mut String, response: &AuthenticationResponse) -> SamlResult<()> {
    let now = response.issue_instant;
    let not_on_or_after = instant(now + Duration::minutes(ASSERTION_VALIDITY_MINUTES));

    let _ = write!(
        xml,
        r#"<saml2:Assertion ID="{}" IssueInstant="{}" Version="2.0"><saml2:Issuer Format="{ENTITY_FORMAT}">{}</saml2:Issuer>"#,
        new_id(),
        instant(now),
        escape(&response.issuer),
    );

    xml.push_str("<saml2:Subject>");
    if let Some(subject) = &response.subject {
        xml.push_str("<saml2:NameID");
        optional_attribute(xml, "Format", response.subject_name_id_format.as_deref());
        let _ = write!(xml, ">{}</saml2:NameID>", escape(subject));
    }
    let _ = write!(
        xml,
        r#"<saml2:SubjectConfirmation Method="{BEARER}"><saml2:SubjectConfirmationData InResponseTo="{}" NotOnOrAfter="{not_on_or_after}""#,
        escape(&response.in_response_to),
    );
    optional_attribute(xml, "Recipient", response.destination.as_deref());
    optional_attribute(xml, "Address", response.ip_address.as_deref());
    xml.push_str("/></saml2:SubjectConfirmation></saml2:Subject>");

    let _ = write!(
        xml,
        r#"<saml2:Conditions NotBefore="{}" NotOnOrAfter="{not_on_or_after}">"#,
        instant(now)
    );
    if let Some(audience) = &response.audience {
        let _ = write!(
            xml,
            "<saml2:AudienceRestriction><saml2:Audience>{}</saml2:Audience></saml2:AudienceRestriction>",
            escape(audience)
        );
    }
    xml.push_str("</saml2:Conditions>");

    let _ = write!(xml, r#"<saml2:AuthnStatement AuthnInstant="{}">"#, instant(now));
    if let Some(ip) = &response.ip_address {
        let _ = write!(xml, r#"<saml2:SubjectLocality Address="{}"/>"#, escape(ip));
    }
    xml.push_str("<saml2:AuthnContext>");
    if let Some(loa) = &response.level_of_assurance {
        let _ = write!(
            xml,
            "<saml2:AuthnContextClassRef>{}</saml2:AuthnContextClassRef>",
            escape(loa)
        );
    }
    xml.push_str("</saml2:AuthnContext></saml2:AuthnStatement>");

    if !response.attributes.is_empty() {
        xml.push_str("<saml2:AttributeStatement>");
        for (definition, values) in response.attributes.iter() {
            let _ = write!(
                xml,
                r#"<saml2:Attribute FriendlyName="{}" Name="{}" NameFormat="{ATTRNAME_FORMAT_URI}">"#,
                escape(&definition.friendly_name),
                escape(&definition.name_uri),
            );
            for value in values {
                let marshalled = definition.marshal(value)?;
                let _ = write!(
                    xml,
                    "<saml2:AttributeValue>{}</saml2:AttributeValue>",
                    escape(&marshalled)
                );
            }
            xml.push_str("</saml2:Attribute>");
        }
        xml.push_str("</saml2:AttributeStatement>");
    }

    xml.push_str("</saml2:Assertion>");
    Ok(())
}
