//! Authentication inputs (spec.md §6, supplemented by §4.2a)
//!
//! These are input *types* consumed by [`crate::conn::Connection::init_azure`]/
//! `init_s3`, not a CLI argument parser — constructing one is a caller's
//! (or a test's) job.

use crate::error::ElastoResult;
use crate::xml::XmlDoc;

/// The two Azure auth inputs spec.md §6 names.
#[derive(Debug, Clone)]
pub enum AzureAuth {
    /// A parsed `.publishsettings` file, used against the management API.
    PublishSettings(PublishSettings),
    /// An account name plus base64-encoded shared key, used directly
    /// against the blob/file data-plane APIs.
    SharedKey { account: String, key_b64: String },
}

/// S3 access-key credentials (spec.md §6).
#[derive(Debug, Clone)]
pub struct S3Auth {
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// The web backend has no authentication (spec.md §6).
#[derive(Debug, Clone, Copy, Default)]
pub struct WebAuth;

/// Fields extracted from a `.publishsettings` XML file (spec.md §4.2a):
/// the subscription identity and a PEM-encoded management client
/// certificate, base64-encoded in the file as `ManagementCertificate`.
#[derive(Debug, Clone)]
pub struct PublishSettings {
    pub subscription_id: String,
    pub subscription_name: String,
    pub management_cert_pem: Vec<u8>,
}

impl PublishSettings {
    /// Parses a `.publishsettings` file's bytes. Grounded on the original's
    /// `cli_common.h` publish-settings consumer: three fields pulled off the
    /// first `<Subscription>` element under `/PublishData/PublishProfile`.
    pub fn parse(xml: &[u8]) -> ElastoResult<Self> {
        let mut doc = XmlDoc::new();
        let id = doc.want_str("/PublishData/PublishProfile/Subscription[@Id]", true)?;
        let name = doc.want_str("/PublishData/PublishProfile/Subscription[@Name]", true)?;
        let cert = doc.want_base64("/PublishData/PublishProfile/Subscription[@ManagementCertificate]", true)?;
        doc.parse(xml)?;

        Ok(Self {
            subscription_id: id.get().unwrap_or_default(),
            subscription_name: name.get().unwrap_or_default(),
            management_cert_pem: cert.get().unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_subscription_identity() {
        let xml = br#"<?xml version="1.0" encoding="utf-8"?>
<PublishData><PublishProfile PublishMethod="AzureServiceManagementAPI" Url="https://management.core.windows.net/">
<Subscription Id="55555555-4444-3333-2222-111111111111" Name="3-Month Free Trial" ManagementCertificate="aGVsbG8=" /></PublishProfile></PublishData>"#;
        let settings = PublishSettings::parse(xml).unwrap();
        assert_eq!(settings.subscription_id, "55555555-4444-3333-2222-111111111111");
        assert_eq!(settings.subscription_name, "3-Month Free Trial");
        assert_eq!(settings.management_cert_pem, b"hello");
    }

    #[test]
    fn rejects_missing_subscription() {
        let xml = b"<PublishData><PublishProfile></PublishProfile></PublishData>";
        assert!(PublishSettings::parse(xml).is_err());
    }
}
