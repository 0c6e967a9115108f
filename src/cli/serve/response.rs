//! HTTP response handlers.

use anyhow::{Context, Result, anyhow};
use std::fs;
use tiny_http::{Header, Method, Request, Response, StatusCode};

use crate::server::Reply;
use crate::utils::mime::types::{HTML, PLAIN, XML};

/// Header sent with the stylesheet so crawlers skip it but follow its links.
const ROBOTS: (&str, &str) = ("X-Robots-Tag", "noindex, follow");

pub fn respond_reply(request: Request, reply: Reply) -> Result<()> {
    match reply {
        Reply::File(path) => {
            let content_type = crate::utils::mime::from_path(&path);
            if is_head_request(&request) {
                return send_head(request, 200, content_type, &[]);
            }
            let body = fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
            send_body(request, 200, content_type, body, &[])
        }
        Reply::Developer(html) => send_body(request, 200, HTML, html.into_bytes(), &[]),
        Reply::Stylesheet(xsl) => send_body(request, 200, XML, xsl.into_bytes(), &[ROBOTS]),
        Reply::Asset { body, content_type } => {
            send_body(request, 200, content_type, body.as_bytes().to_vec(), &[])
        }
    }
}

pub fn respond_not_found(request: Request) -> Result<()> {
    send_body(request, 404, PLAIN, b"404 Not Found".to_vec(), &[])
}

pub fn respond_method_not_allowed(request: Request) -> Result<()> {
    send_body(
        request,
        405,
        PLAIN,
        b"405 Method Not Allowed".to_vec(),
        &[("Allow", "GET, HEAD")],
    )
}

/// Respond with 500; the cause is logged, not sent.
pub fn respond_error(request: Request) -> Result<()> {
    send_body(request, 500, PLAIN, b"500 Internal Server Error".to_vec(), &[])
}

/// Respond with 503 Service Unavailable (server shutting down).
pub fn respond_unavailable(request: Request) -> Result<()> {
    send_body(request, 503, PLAIN, b"503 Service Unavailable".to_vec(), &[])
}

pub fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

pub fn is_read_request(request: &Request) -> bool {
    matches!(request.method(), Method::Get | Method::Head)
}

fn send_head(
    request: Request,
    status: u16,
    content_type: &'static str,
    extra: &[(&str, &str)],
) -> Result<()> {
    let mut response =
        Response::empty(StatusCode(status)).with_header(make_header("Content-Type", content_type)?);
    for (key, value) in extra {
        response.add_header(make_header(key, value)?);
    }
    request.respond(response)?;
    Ok(())
}

fn send_body(
    request: Request,
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
    extra: &[(&str, &str)],
) -> Result<()> {
    if is_head_request(&request) {
        return send_head(request, status, content_type, extra);
    }
    let mut response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(make_header("Content-Type", content_type)?);
    for (key, value) in extra {
        response.add_header(make_header(key, value)?);
    }
    request.respond(response)?;
    Ok(())
}

fn make_header(key: &str, value: &str) -> Result<Header> {
    Header::from_bytes(key, value).map_err(|()| anyhow!("invalid header `{key}: {value}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_build() {
        assert!(make_header(ROBOTS.0, ROBOTS.1).is_ok());
        assert!(make_header("Content-Type", XML).is_ok());
    }
}
