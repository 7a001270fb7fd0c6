//! Client side of the text-based request/response wire.
//!
//! The engine is generic over [`Transport`] so tests can script the server;
//! the shipped implementation speaks plain HTTP/1.1 over a fresh TCP
//! connection per request, which is all the trace server requires.

use log::trace;
use std::fmt::Write as _;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error("server answered http status {0}")]
    Status(u16),
    #[error("invalid http response: {0}")]
    Http(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Body {
    Empty,
    /// `application/x-www-form-urlencoded` key/value pairs.
    Form(Vec<(&'static str, String)>),
    /// Raw `text/plain` payload (source code, stdin lines, base64 blobs).
    Text(String),
}

/// One logical request to the trace server.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub endpoint: &'static str,
    pub query: Vec<(&'static str, String)>,
    pub body: Body,
}

impl Request {
    pub fn get(endpoint: &'static str) -> Self {
        Self {
            method: Method::Get,
            endpoint,
            query: vec![],
            body: Body::Empty,
        }
    }

    pub fn post(endpoint: &'static str) -> Self {
        Self {
            method: Method::Post,
            endpoint,
            query: vec![],
            body: Body::Empty,
        }
    }

    pub fn query(mut self, key: &'static str, value: impl ToString) -> Self {
        self.query.push((key, value.to_string()));
        self
    }

    pub fn form(mut self, fields: Vec<(&'static str, String)>) -> Self {
        self.body = Body::Form(fields);
        self
    }

    pub fn text(mut self, payload: impl Into<String>) -> Self {
        self.body = Body::Text(payload.into());
        self
    }

    /// Request target: endpoint plus percent-encoded query string.
    pub fn target(&self) -> String {
        let mut target = self.endpoint.to_string();
        for (i, (key, value)) in self.query.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            _ = write!(target, "{sep}{key}={}", urlencoding::encode(value));
        }
        target
    }

    fn encoded_body(&self) -> (Option<&'static str>, String) {
        match &self.body {
            Body::Empty => (None, String::new()),
            Body::Text(text) => (Some("text/plain; charset=utf-8"), text.clone()),
            Body::Form(fields) => {
                let mut body = String::new();
                for (i, (key, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        body.push('&');
                    }
                    _ = write!(body, "{key}={}", urlencoding::encode(value));
                }
                (Some("application/x-www-form-urlencoded"), body)
            }
        }
    }
}

pub trait Transport {
    /// Issue one request and return the raw response body of a 2xx answer.
    /// Any other outcome (connect failure, bad status, truncated response)
    /// is a transport error - the caller never retries those.
    fn roundtrip(
        &mut self,
        req: Request,
    ) -> impl std::future::Future<Output = Result<Vec<u8>, TransportError>>;
}

/// HTTP/1.1 over TCP, one connection per request.
pub struct HttpTransport {
    addr: String,
}

impl HttpTransport {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl Transport for HttpTransport {
    async fn roundtrip(&mut self, req: Request) -> Result<Vec<u8>, TransportError> {
        let target = req.target();
        let (content_type, body) = req.encoded_body();

        let mut head = format!(
            "{} {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n",
            req.method.as_str(),
            target,
            self.addr
        );
        if let Some(content_type) = content_type {
            _ = write!(head, "Content-Type: {content_type}\r\n");
        }
        if req.method == Method::Post {
            _ = write!(head, "Content-Length: {}\r\n", body.len());
        }
        head.push_str("\r\n");

        trace!(target: "transport", "{} {target} ({} byte body)", req.method.as_str(), body.len());

        let mut stream = TcpStream::connect(&self.addr).await?;
        stream.write_all(head.as_bytes()).await?;
        if req.method == Method::Post {
            stream.write_all(body.as_bytes()).await?;
        }
        stream.flush().await?;

        let mut reader = BufReader::new(stream);

        let mut status_line = String::new();
        reader.read_line(&mut status_line).await?;
        let status: u16 = status_line
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .ok_or(TransportError::Http("missing status code"))?;
        if !(200..300).contains(&status) {
            return Err(TransportError::Status(status));
        }

        let mut content_length: Option<usize> = None;
        loop {
            let mut header = String::new();
            if reader.read_line(&mut header).await? == 0 {
                return Err(TransportError::Http("eof before end of headers"));
            }
            let header = header.trim();
            if header.is_empty() {
                break;
            }
            if let Some((name, value)) = header.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().ok();
                }
            }
        }

        let mut payload = Vec::new();
        match content_length {
            Some(len) => {
                payload.resize(len, 0);
                reader.read_exact(&mut payload).await?;
            }
            // `Connection: close` - the body runs until the server hangs up
            None => {
                reader.read_to_end(&mut payload).await?;
            }
        }

        trace!(target: "transport", "{status} ({} byte response)", payload.len());

        Ok(payload)
    }
}
