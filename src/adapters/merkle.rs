//! Merkle consumer feed: one XML interaction file per contact, dropped into
//! the Merkle SFTP inbox.
//!
//! File names follow Merkle's convention:
//! `<CLIENT_NAME>_<BRAND_CD>_CNSMR_<CHANNEL>_<ccyymmddhhmiss>_<rec_count>.xml`
//! where channel `W` is Web.

use crate::config::{required_env, Stage};
use crate::utils::error::{ConnectorError, Result};
use crate::utils::validation::{validate_email, validate_non_empty_string, Validate};
use chrono::{Local, NaiveDateTime};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, Event};
use quick_xml::Writer;
use serde::{Deserialize, Deserializer, Serialize};
use ssh2::Session;
use std::io::{Cursor, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};

const REMOTE_INBOX: &str = "/Inbox";
const SFTP_PORT: u16 = 22;

/// Campaign metadata, stored as JSON in the `mrkle_meta` environment variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerkleMeta {
    #[serde(rename = "ExternalID")]
    pub external_id: String,
    #[serde(rename = "SourceCode")]
    pub source_code: String,
    #[serde(rename = "VendorCode")]
    pub vendor_code: String,
    #[serde(rename = "ChannelCode")]
    pub channel_code: String,
    #[serde(rename = "ProductCode")]
    pub product_code: String,
    #[serde(rename = "CampaignCode")]
    pub campaign_code: String,
    #[serde(rename = "PromoCode")]
    pub promo_code: String,
    #[serde(rename = "KitCode")]
    pub kit_code: String,
    #[serde(rename = "OfferCode")]
    pub offer_code: String,
    #[serde(rename = "MediaOriginCode")]
    pub media_origin_code: String,
}

fn contact_type_from_number_or_text<'de, D>(deserializer: D) -> std::result::Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u8),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

fn flag_from_bool_number_or_text<'de, D>(deserializer: D) -> std::result::Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Number(u8),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Bool(b) => Ok(b),
        Raw::Number(0) => Ok(false),
        Raw::Number(1) => Ok(true),
        Raw::Number(n) => Err(serde::de::Error::custom(format!("expected 0 or 1, got {}", n))),
        Raw::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!("not a boolean: {}", other))),
        },
    }
}

/// Contact form data posted to the handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerkleContact {
    pub address: String,
    pub city: String,
    pub email: String,
    pub firstname: String,
    pub lastname: String,
    pub state: String,
    pub zipcode: String,
    #[serde(deserialize_with = "contact_type_from_number_or_text")]
    pub contact_type: u8,
    #[serde(default, deserialize_with = "flag_from_bool_number_or_text")]
    pub has_prescription: bool,
}

#[derive(Clone)]
pub struct SftpCredentials {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for SftpCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SftpCredentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct MerkleConfig {
    pub meta: MerkleMeta,
    pub credentials: SftpCredentials,
}

impl MerkleConfig {
    /// Reads `mrkle_meta`, `ftp_host` and the stage's SFTP login.
    /// Prod uses `ftp_username_prod`/`ftp_password_prod`; every other stage
    /// uses the `_test` pair.
    pub fn from_env(stage: Stage) -> Result<Self> {
        let meta: MerkleMeta = serde_json::from_str(&required_env("mrkle_meta")?)?;

        tracing::info!("Merkle credentials for stage {}", stage);
        let (username, password) = match stage {
            Stage::Prod => (
                required_env("ftp_username_prod")?,
                required_env("ftp_password_prod")?,
            ),
            _ => (
                required_env("ftp_username_test")?,
                required_env("ftp_password_test")?,
            ),
        };

        Ok(Self {
            meta,
            credentials: SftpCredentials {
                host: required_env("ftp_host")?,
                port: SFTP_PORT,
                username,
                password,
            },
        })
    }
}

impl Validate for MerkleConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("ProductCode", &self.meta.product_code)?;
        validate_non_empty_string("ftp_host", &self.credentials.host)?;
        validate_non_empty_string("ftp_username", &self.credentials.username)?;
        validate_non_empty_string("ftp_password", &self.credentials.password)
    }
}

/// One `<Answer>` of the survey block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurveyAnswer {
    pub answer_id: u8,
    pub question_id: u16,
}

impl SurveyAnswer {
    fn write<W: std::io::Write>(&self, writer: &mut Writer<W>) -> Result<()> {
        let answer_id = self.answer_id.to_string();
        let question_id = self.question_id.to_string();
        writer.write_event(Event::Empty(BytesStart::new("Answer").with_attributes([
            ("AnswerID", answer_id.as_str()),
            ("OpenEndedQuestionInd", "N"),
            ("QuestionID", question_id.as_str()),
        ])))?;
        Ok(())
    }
}

/// The prescription question from Merkle's survey codes: question 9842 for
/// contact type 2, 9843 for type 3, answer 1 (yes) or 2 (no). Other contact
/// types are not asked.
pub fn build_xml_prop(contact: &MerkleContact) -> Option<SurveyAnswer> {
    let question_id = match contact.contact_type {
        2 => 9842,
        3 => 9843,
        _ => return None,
    };

    Some(SurveyAnswer {
        answer_id: if contact.has_prescription { 1 } else { 2 },
        question_id,
    })
}

pub fn build_filename(meta: &MerkleMeta, captured_at: &NaiveDateTime) -> String {
    format!(
        "_{}_CNSMR_W_{}_4.xml",
        meta.product_code,
        captured_at.format("%Y%m%d%H%M%S")
    )
}

pub fn build_payload(
    meta: &MerkleMeta,
    contact: &MerkleContact,
    captured_at: &NaiveDateTime,
) -> Result<String> {
    let timestamp = captured_at.format("%Y-%m-%dT%H:%M:%S").to_string();
    let contact_type = contact.contact_type.to_string();

    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b'\t', 1);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("Interactions")))?;

    writer.write_event(Event::Start(BytesStart::new("Interaction").with_attributes([
        ("ExternalID", meta.external_id.as_str()),
        ("SourceCode", meta.source_code.as_str()),
        ("VendorCode", meta.vendor_code.as_str()),
        ("ChannelCode", meta.channel_code.as_str()),
        ("ProductCode", meta.product_code.as_str()),
    ])))?;

    writer.write_event(Event::Empty(BytesStart::new("Consumer").with_attributes([
        ("AddressLine1", contact.address.as_str()),
        ("CaptureDate", timestamp.as_str()),
        ("City", contact.city.as_str()),
        ("EmailAddress", contact.email.as_str()),
        ("FirstName", contact.firstname.as_str()),
        ("LastName", contact.lastname.as_str()),
        ("State", contact.state.as_str()),
        ("ZipCodeBase", contact.zipcode.as_str()),
    ])))?;

    writer.write_event(Event::Empty(BytesStart::new("Campaign").with_attributes([
        ("CampaignCode", meta.campaign_code.as_str()),
        ("PromoCode", meta.promo_code.as_str()),
        ("KitCode", meta.kit_code.as_str()),
        ("OfferCode", meta.offer_code.as_str()),
    ])))?;

    writer.write_event(Event::Empty(BytesStart::new("Response").with_attributes([
        ("ResponseDate", timestamp.as_str()),
        ("MediaOriginCode", meta.media_origin_code.as_str()),
    ])))?;

    writer.write_event(Event::Start(
        BytesStart::new("Survey").with_attributes([("SurveyDate", timestamp.as_str())]),
    ))?;
    writer.write_event(Event::Start(BytesStart::new("Answers")))?;
    SurveyAnswer {
        answer_id: 1,
        question_id: 9840,
    }
    .write(&mut writer)?;
    writer.write_event(Event::Empty(BytesStart::new("Answer").with_attributes([
        ("AnswerID", contact_type.as_str()),
        ("OpenEndedQuestionInd", "N"),
        ("QuestionID", "9841"),
    ])))?;
    if let Some(answer) = build_xml_prop(contact) {
        answer.write(&mut writer)?;
    }
    writer.write_event(Event::End(BytesEnd::new("Answers")))?;
    writer.write_event(Event::End(BytesEnd::new("Survey")))?;

    writer.write_event(Event::End(BytesEnd::new("Interaction")))?;
    writer.write_event(Event::End(BytesEnd::new("Interactions")))?;

    let mut bytes = writer.into_inner().into_inner();
    bytes.push(b'\n');
    String::from_utf8(bytes).map_err(|e| ConnectorError::service("Merkle", e.to_string()))
}

fn upload_blocking(credentials: &SftpCredentials, local_path: &Path, remote_path: &str) -> Result<()> {
    let contents = std::fs::read(local_path)?;

    tracing::info!("Connecting to Merkle SFTP {}:{}", credentials.host, credentials.port);
    let tcp = TcpStream::connect((credentials.host.as_str(), credentials.port))?;

    let mut session = Session::new()?;
    session.set_tcp_stream(tcp);
    session.handshake()?;
    session.userauth_password(&credentials.username, &credentials.password)?;
    if !session.authenticated() {
        return Err(ConnectorError::service("Merkle", "SFTP authentication failed"));
    }

    let sftp = session.sftp()?;
    let mut remote = sftp.create(Path::new(remote_path))?;
    remote.write_all(&contents)?;
    remote.close()?;

    Ok(())
}

pub struct MerkleSftp {
    stage: Stage,
    config: MerkleConfig,
    contact: MerkleContact,
    filename: String,
    payload: String,
}

impl MerkleSftp {
    pub fn new(stage: Stage, config: MerkleConfig, contact: MerkleContact) -> Result<Self> {
        Self::captured_at(stage, config, contact, Local::now().naive_local())
    }

    pub fn from_env(stage: Stage, contact: MerkleContact) -> Result<Self> {
        Self::new(stage, MerkleConfig::from_env(stage)?, contact)
    }

    /// Builds the file for a fixed capture time. Filename and payload dates
    /// always come from the same instant.
    pub fn captured_at(
        stage: Stage,
        config: MerkleConfig,
        contact: MerkleContact,
        captured_at: NaiveDateTime,
    ) -> Result<Self> {
        config.validate()?;
        validate_email("email", &contact.email)?;

        let filename = build_filename(&config.meta, &captured_at);
        tracing::info!("Merkle filename: {}", filename);

        let payload = build_payload(&config.meta, &contact, &captured_at)?;
        tracing::debug!("Merkle payload:\n{}", payload);

        Ok(Self {
            stage,
            config,
            contact,
            filename,
            payload,
        })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn contact(&self) -> &MerkleContact {
        &self.contact
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn remote_path(&self) -> String {
        format!("{}/{}", REMOTE_INBOX, self.filename)
    }

    /// Writes the payload to `dir/<filename>` and returns the path.
    pub async fn save_temp_payload_file(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(&self.filename);
        tokio::fs::write(&path, self.payload.as_bytes()).await?;
        tracing::info!("Merkle payload saved to {}", path.display());
        Ok(path)
    }

    /// Stages the file in the system temp dir and uploads it to the inbox.
    pub async fn transfer_data(&self) -> Result<()> {
        self.transfer_data_from(&std::env::temp_dir()).await
    }

    pub async fn transfer_data_from(&self, staging_dir: &Path) -> Result<()> {
        tracing::info!("Merkle transfer ({}) start", self.stage);

        let local_path = self.save_temp_payload_file(staging_dir).await?;
        let remote_path = self.remote_path();
        let credentials = self.config.credentials.clone();

        let result = tokio::task::spawn_blocking(move || {
            upload_blocking(&credentials, &local_path, &remote_path)
        })
        .await
        .map_err(ConnectorError::from)
        .and_then(|r| r);

        match &result {
            Ok(()) => tracing::info!("Merkle transfer uploaded {}", self.remote_path()),
            Err(e) => tracing::error!("Merkle transfer failed: {}", e),
        }
        result
    }
}
