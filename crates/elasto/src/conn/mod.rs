//! Connection: transport, signing credentials, and the `txrx` pipeline (spec.md §4.3)

use reqwest::Client;
use tracing::debug;

use crate::elasto_error;
use crate::error::{ElastoErrorKind, ElastoResult, kind_from_status};
use crate::header::HeaderList;
use crate::op::{DataStream, Op, RawResponse, SignMode};
use crate::sign::{azure_shared_key, s3_v2};
use crate::xml::XmlDoc;

enum Credentials {
    AzureSharedKey { account: String, key: Vec<u8> },
    S3 { id: String, secret: String },
    None,
}

/// A bound connection to one host, carrying the signing key and a
/// keep-alive HTTP client (spec.md §4.3). One connection serves one Op at
/// a time; there is no request pipelining (spec.md §5).
pub struct Connection {
    client: Client,
    hostname: String,
    insecure_http: bool,
    credentials: Credentials,
}

impl Connection {
    /// Prepares a connection for Azure backends, signing with shared-key
    /// once a key is installed via [`Connection::sign_setkey`]. `pem_file`
    /// is a client certificate for the management API's mutual-TLS
    /// requirement; loading it is the caller's responsibility before the
    /// first `txrx` (reqwest takes an `Identity` at client-build time).
    pub fn init_azure(host: impl Into<String>, insecure_http: bool, client_identity: Option<reqwest::Identity>) -> ElastoResult<Self> {
        let mut builder = Client::builder().tcp_keepalive(std::time::Duration::from_secs(60));
        if let Some(identity) = client_identity {
            builder = builder.identity(identity);
        }
        let client = builder.build().map_err(|e| elasto_error!(ElastoErrorKind::Io, "failed to build http client: {e}"))?;
        Ok(Self { client, hostname: host.into(), insecure_http, credentials: Credentials::None })
    }

    /// Prepares a connection signing every request with S3 access keys.
    pub fn init_s3(host: impl Into<String>, insecure_http: bool, id: impl Into<String>, secret: impl Into<String>) -> ElastoResult<Self> {
        let client = Client::builder()
            .tcp_keepalive(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| elasto_error!(ElastoErrorKind::Io, "failed to build http client: {e}"))?;
        Ok(Self {
            client,
            hostname: host.into(),
            insecure_http,
            credentials: Credentials::S3 { id: id.into(), secret: secret.into() },
        })
    }

    /// Installs a shared key obtained out-of-band (e.g. from the
    /// management API's `get_account_keys`), decoding it from base64.
    pub fn sign_setkey(&mut self, account: impl Into<String>, key_b64: &str) -> ElastoResult<()> {
        let key = base64_simd::STANDARD
            .decode_to_vec(key_b64.as_bytes())
            .map_err(|e| elasto_error!(ElastoErrorKind::InvalidArgument, "malformed shared key: {e}"))?;
        self.credentials = Credentials::AzureSharedKey { account: account.into(), key };
        Ok(())
    }

    #[must_use]
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Runs the operation pipeline for one `op` (spec.md §4.1): host/scheme
    /// check, sign, dispatch, decode headers, and follow at most one S3
    /// redirect. Retries once, transparently, if the transport closes
    /// mid-flight.
    pub async fn txrx(&mut self, mut op: Op) -> ElastoResult<RawResponse> {
        self.check_target(&op)?;

        match self.try_once(&mut op).await {
            Ok(resp) if resp.status == 301 && op.sign_mode() == SignMode::S3V2 => self.follow_redirect(op, &resp).await,
            Ok(resp) if resp.status == 301 => {
                Err(elasto_error!(ElastoErrorKind::NotSupported, "redirect is only supported for S3 operations"))
            }
            Ok(resp) => Ok(resp),
            Err(e) if is_transport_close(&e) => {
                debug!(host = %self.hostname, "transport closed mid-flight, retrying once");
                self.try_once(&mut op).await
            }
            Err(e) => Err(e),
        }
    }

    fn check_target(&self, op: &Op) -> ElastoResult<()> {
        if op.url_host != self.hostname {
            return Err(elasto_error!(
                ElastoErrorKind::InvalidArgument,
                "op targets {} but connection is bound to {}",
                op.url_host,
                self.hostname
            ));
        }
        if op.requires_https && self.insecure_http {
            return Err(elasto_error!(ElastoErrorKind::InvalidArgument, "op requires https but connection is plain http"));
        }
        Ok(())
    }

    async fn follow_redirect(&mut self, mut op: Op, first: &RawResponse) -> ElastoResult<RawResponse> {
        let redir_host = parse_redirect_endpoint(&first.body)?;
        debug!(from = %self.hostname, to = %redir_host, "following s3 redirect");
        self.hostname = redir_host.clone();
        op.url_host = redir_host;
        let resp = self.try_once(&mut op).await?;
        if resp.status == 301 {
            return Err(elasto_error!(ElastoErrorKind::CorruptResponse, "second redirect hop rejected"));
        }
        Ok(resp)
    }

    async fn try_once(&self, op: &mut Op) -> ElastoResult<RawResponse> {
        let body = materialize(&op.request_body)?;
        op.headers.set("content-length", body.len().to_string());
        self.sign(op)?;

        let scheme = if self.insecure_http { "http" } else { "https" };
        let mut url = format!("{scheme}://{}{}", op.url_host, op.url_path);
        if !op.url_query.is_empty() {
            url.push('?');
            for (i, (k, v)) in op.url_query.iter().enumerate() {
                if i > 0 {
                    url.push('&');
                }
                url.push_str(&urlencode(k));
                url.push('=');
                url.push_str(&urlencode(v));
            }
        }

        debug!(method = %op.method, url = %url, "sending request");

        let mut builder = self.client.request(op.method.clone(), &url).body(body);
        for (name, value) in op.headers.iter() {
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(|e| {
            let mut err = elasto_error!(ElastoErrorKind::TransientRetry, "transport error: {e}");
            err.set_source(e);
            err
        })?;

        let status = response.status().as_u16();
        let mut headers = HeaderList::new();
        for (name, value) in response.headers() {
            headers.push(name.as_str().to_owned(), value.to_str().unwrap_or_default().to_owned());
        }
        let request_id = headers.get("x-ms-request-id").map(str::to_owned);

        let body: bytes::Bytes =
            response.bytes().await.map_err(|e| elasto_error!(ElastoErrorKind::TransientRetry, "transport error reading body: {e}"))?;
        let body = body.to_vec();

        let raw = RawResponse { status, headers, body, request_id };

        if !raw.is_success() && raw.status != 301 {
            let kind = kind_from_status(raw.status, None);
            let mut err = elasto_error!(kind, "request failed with status {}", raw.status);
            err.set_http_status(raw.status);
            if let Some(ref id) = raw.request_id {
                err.set_request_id(id.clone());
            }
            return Err(err);
        }
        Ok(raw)
    }

    fn sign(&self, op: &mut Op) -> ElastoResult<()> {
        match op.sign_mode() {
            SignMode::None => Ok(()),
            SignMode::AzureSharedKeyFull | SignMode::AzureSharedKeyLite => {
                let Credentials::AzureSharedKey { account, key } = &self.credentials else {
                    return Err(elasto_error!(ElastoErrorKind::InvalidArgument, "connection has no shared key installed"));
                };
                if op.sign_mode() == SignMode::AzureSharedKeyFull {
                    azure_shared_key::sign(op, account, key)
                } else {
                    azure_shared_key::sign_lite(op, account, key)
                }
            }
            SignMode::S3V2 => {
                let Credentials::S3 { id, secret } = &self.credentials else {
                    return Err(elasto_error!(ElastoErrorKind::InvalidArgument, "connection has no S3 credentials installed"));
                };
                let bucket = op.sign_bucket.clone();
                s3_v2::sign(op, id, secret.as_bytes(), bucket.as_deref())
            }
        }
    }
}

/// S3 301 responses carry the redirect target as `<Endpoint>` in the body,
/// not a `Location` header (spec.md §9, §4.1 step 5).
fn parse_redirect_endpoint(body: &[u8]) -> ElastoResult<String> {
    let mut doc = XmlDoc::new();
    let endpoint = doc.want_str("/Error/Endpoint", true)?;
    doc.parse(body).map_err(|_| elasto_error!(ElastoErrorKind::CorruptResponse, "301 response body missing <Endpoint>"))?;
    endpoint.get().ok_or_else(|| elasto_error!(ElastoErrorKind::CorruptResponse, "301 response body missing <Endpoint>"))
}

fn is_transport_close(err: &crate::error::ElastoError) -> bool {
    err.kind() == ElastoErrorKind::TransientRetry && err.http_status().is_none()
}

/// Reads an entire [`DataStream`] into memory for the request body. `File`
/// streams are read from disk directly; `Cb` streams are drained via their
/// producer callback in `Op`'s declared length.
fn materialize(stream: &DataStream) -> ElastoResult<Vec<u8>> {
    match stream {
        DataStream::None => Ok(Vec::new()),
        DataStream::Iov { .. } => stream.read_at(0, stream.len() as usize),
        DataStream::File { path, off, len } => {
            use std::io::{Read, Seek, SeekFrom};
            let mut f = std::fs::File::open(path.as_ref())
                .map_err(|e| elasto_error!(ElastoErrorKind::Io, "failed to open {}: {e}", path.display()))?;
            f.seek(SeekFrom::Start(*off)).map_err(|e| elasto_error!(ElastoErrorKind::Io, "seek failed: {e}"))?;
            let mut buf = vec![0u8; *len as usize];
            f.read_exact(&mut buf).map_err(|e| elasto_error!(ElastoErrorKind::Io, "read failed: {e}"))?;
            Ok(buf)
        }
        DataStream::Cb { .. } => stream.read_at(0, stream.len() as usize),
    }
}

fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}
