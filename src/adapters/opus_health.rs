//! OPUS Health Partner Interface (SOAP), used to reserve the next sample
//! document number for a partner group.

use crate::adapters::http::{ensure_success, transport_failure};
use crate::config::required_env;
use crate::utils::error::{ConnectorError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_url, Validate};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::io::Cursor;

const SERVICE: &str = "OPUS Health";
const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const PARTNER_NS: &str = "http://www.tripleiesampling.com/PartnerInterfaceWS/";
const DOCUMENT_NUMBER_PATH: [&str; 5] = [
    "Envelope",
    "Body",
    "GetNextAvailableDocumentNumberResponse",
    "GetNextAvailableDocumentNumberResult",
    "DocumentNumber",
];

#[derive(Debug, Clone)]
pub struct OpusMeta {
    pub url: String,
    pub user: String,
    pub password: String,
    pub group_id: String,
}

impl OpusMeta {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            url: required_env("opus_url")?,
            user: required_env("opus_user")?,
            password: required_env("opus_password")?,
            group_id: required_env("opus_group_id")?,
        })
    }
}

impl Validate for OpusMeta {
    fn validate(&self) -> Result<()> {
        validate_url("url", &self.url)?;
        validate_non_empty_string("user", &self.user)?;
        validate_non_empty_string("password", &self.password)?;
        validate_non_empty_string("group_id", &self.group_id)
    }
}

fn write_text_element<W: std::io::Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// Pulls `DocumentNumber` out of a `GetNextAvailableDocumentNumber` response.
/// Elements are matched by local name, so any namespace prefix is accepted.
pub fn get_document_number(xml: &str) -> Result<String> {
    tracing::debug!("OPUS response xml: {}", xml);

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut path: Vec<String> = Vec::new();
    let mut document_number: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                path.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Event::End(_) => {
                path.pop();
            }
            Event::Text(text) if path == DOCUMENT_NUMBER_PATH => {
                document_number
                    .get_or_insert_with(String::new)
                    .push_str(&text.unescape()?);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    document_number
        .filter(|n| !n.is_empty())
        .ok_or_else(|| {
            tracing::error!("OPUS response has no DocumentNumber");
            ConnectorError::service(SERVICE, "response has no DocumentNumber")
        })
}

pub struct OpusHealthPartnerInterface {
    client: Client,
    meta: Option<OpusMeta>,
}

impl Default for OpusHealthPartnerInterface {
    fn default() -> Self {
        Self::new()
    }
}

impl OpusHealthPartnerInterface {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
            meta: None,
        }
    }

    pub fn from_env() -> Result<Self> {
        let mut opus = Self::new();
        opus.set_meta(OpusMeta::from_env()?)?;
        Ok(opus)
    }

    pub fn set_meta(&mut self, meta: OpusMeta) -> Result<()> {
        meta.validate().inspect_err(|e| {
            tracing::error!("OPUS set_meta rejected: {}", e);
        })?;
        self.meta = Some(meta);
        Ok(())
    }

    fn meta(&self) -> Result<&OpusMeta> {
        self.meta
            .as_ref()
            .ok_or_else(|| ConnectorError::config("OPUS meta not set; call set_meta first"))
    }

    /// The `GetNextAvailableDocumentNumber` SOAP envelope.
    pub fn build_payload(&self) -> Result<String> {
        let meta = self.meta()?;
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        writer.write_event(Event::Start(
            BytesStart::new("soapenv:Envelope").with_attributes([
                ("xmlns:soapenv", SOAP_ENVELOPE_NS),
                ("xmlns:par", PARTNER_NS),
            ]),
        ))?;

        writer.write_event(Event::Start(BytesStart::new("soapenv:Header")))?;
        writer.write_event(Event::Start(BytesStart::new("par:ESamplingSoapHeader")))?;
        write_text_element(&mut writer, "par:UserName", &meta.user)?;
        write_text_element(&mut writer, "par:Password", &meta.password)?;
        writer.write_event(Event::End(BytesEnd::new("par:ESamplingSoapHeader")))?;
        writer.write_event(Event::End(BytesEnd::new("soapenv:Header")))?;

        writer.write_event(Event::Start(BytesStart::new("soapenv:Body")))?;
        writer.write_event(Event::Start(BytesStart::new(
            "par:GetNextAvailableDocumentNumber",
        )))?;
        write_text_element(&mut writer, "par:groupNumber", &meta.group_id)?;
        writer.write_event(Event::End(BytesEnd::new(
            "par:GetNextAvailableDocumentNumber",
        )))?;
        writer.write_event(Event::End(BytesEnd::new("soapenv:Body")))?;

        writer.write_event(Event::End(BytesEnd::new("soapenv:Envelope")))?;

        String::from_utf8(writer.into_inner().into_inner())
            .map_err(|e| ConnectorError::service(SERVICE, e.to_string()))
    }

    /// Sends the envelope and returns the raw response body.
    pub async fn post_request(&self) -> Result<String> {
        let meta = self.meta()?;
        let payload = self.build_payload()?;
        tracing::info!("Posting GetNextAvailableDocumentNumber for group {}", meta.group_id);

        let response = self
            .client
            .post(&meta.url)
            .header(CONTENT_TYPE, "text/xml;charset=utf-8")
            .body(payload)
            .send()
            .await
            .map_err(|e| transport_failure(SERVICE, e))?;

        tracing::info!("OPUS response status code: {}", response.status().as_u16());
        let body = ensure_success(SERVICE, response).await?.text().await?;
        Ok(body)
    }

    pub async fn next_document_number(&self) -> Result<String> {
        let body = self.post_request().await?;
        let number = get_document_number(&body)?;
        tracing::info!("OPUS document number: {}", number);
        Ok(number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opus() -> OpusHealthPartnerInterface {
        let mut opus = OpusHealthPartnerInterface::new();
        opus.set_meta(OpusMeta {
            url: "https://partner.example.com/PartnerInterface.asmx".to_string(),
            user: "partner".to_string(),
            password: "p<&>ss".to_string(),
            group_id: "G-100".to_string(),
        })
        .unwrap();
        opus
    }

    #[test]
    fn test_build_payload_escapes_credentials() {
        let payload = opus().build_payload().unwrap();

        assert!(payload.starts_with("<soapenv:Envelope"));
        assert!(payload.contains(r#"xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/""#));
        assert!(payload.contains(r#"xmlns:par="http://www.tripleiesampling.com/PartnerInterfaceWS/""#));
        assert!(payload.contains("<par:UserName>partner</par:UserName>"));
        assert!(payload.contains("<par:Password>p&lt;&amp;&gt;ss</par:Password>"));
        assert!(payload.contains("<par:groupNumber>G-100</par:groupNumber>"));
    }

    #[test]
    fn test_build_payload_requires_meta() {
        let opus = OpusHealthPartnerInterface::new();
        assert!(matches!(
            opus.build_payload(),
            Err(ConnectorError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_get_document_number() {
        let xml = r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <GetNextAvailableDocumentNumberResponse xmlns="http://www.tripleiesampling.com/PartnerInterfaceWS/">
      <GetNextAvailableDocumentNumberResult>
        <DocumentNumber>DOC-000123</DocumentNumber>
        <GroupNumber>G-100</GroupNumber>
      </GetNextAvailableDocumentNumberResult>
    </GetNextAvailableDocumentNumberResponse>
  </soap:Body>
</soap:Envelope>"#;

        assert_eq!(get_document_number(xml).unwrap(), "DOC-000123");
    }

    #[test]
    fn test_get_document_number_missing() {
        let xml = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><soap:Body><soap:Fault><faultstring>Invalid group</faultstring></soap:Fault></soap:Body></soap:Envelope>"#;
        assert!(get_document_number(xml).is_err());
    }
}
