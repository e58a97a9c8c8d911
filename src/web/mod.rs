//! Browser upload form over a small blocking HTTP/1.1 server.
//!
//! Requests are handled one at a time on the server thread; each upload runs
//! the whole report pipeline before the response is written.

use crate::pipeline::ReportPipeline;
use anyhow::{anyhow, Result};
use percent_encoding::percent_decode_str;
use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use url::Url;

pub mod multipart;
pub mod page;

use page::ResultLinks;

const MAX_HEADER_BYTES: usize = 16 * 1024;
const PREDICTIONS_PREFIX: &str = "/static/predictions/";
const REPORTS_PREFIX: &str = "/static/reports/";

#[derive(Clone, Debug)]
pub struct WebConfig {
    pub addr: String,
    pub max_upload_bytes: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:5000".to_string(),
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

#[derive(Debug)]
pub struct WebHandle {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl WebHandle {
    pub fn stop(mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            join.join()
                .map_err(|_| anyhow!("web server thread panicked"))?;
        }
        Ok(())
    }
}

pub struct WebServer {
    cfg: WebConfig,
    pipeline: ReportPipeline,
}

impl WebServer {
    pub fn new(cfg: WebConfig, pipeline: ReportPipeline) -> Self {
        Self { cfg, pipeline }
    }

    pub fn spawn(self) -> Result<WebHandle> {
        let configured_addr: SocketAddr = self.cfg.addr.parse()?;
        let listener = TcpListener::bind(configured_addr)?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_thread = shutdown.clone();
        let cfg = self.cfg;
        let pipeline = self.pipeline;
        let join = std::thread::spawn(move || {
            if let Err(err) = run_server(listener, &cfg, &pipeline, shutdown_thread) {
                log::error!("web server stopped: {}", err);
            }
        });

        Ok(WebHandle {
            addr,
            shutdown,
            join: Some(join),
        })
    }
}

fn run_server(
    listener: TcpListener,
    cfg: &WebConfig,
    pipeline: &ReportPipeline,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, _)) => {
                if let Err(err) = handle_connection(stream, cfg, pipeline) {
                    log::warn!("request rejected: {}", err);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

fn handle_connection(
    mut stream: TcpStream,
    cfg: &WebConfig,
    pipeline: &ReportPipeline,
) -> Result<()> {
    stream.set_nonblocking(false)?;
    let (request, leftover) = read_head(&mut stream)?;
    log::debug!("{} {}", request.method, request.path);

    match (request.method.as_str(), request.path.as_str()) {
        ("GET", "/health") => {
            write_response(&mut stream, 200, "application/json", br#"{"status":"ok"}"#)
        }
        ("GET", "/") => write_html(&mut stream, 200, &page::render_index(None)),
        ("POST", "/") => handle_upload(&mut stream, &request, leftover, cfg, pipeline),
        ("GET", path) if path.starts_with(PREDICTIONS_PREFIX) => {
            let file = decode_name(&path[PREDICTIONS_PREFIX.len()..])
                .and_then(|name| pipeline.store().prediction_file(&name));
            serve_file(&mut stream, file, "image/jpeg")
        }
        ("GET", path) if path.starts_with(REPORTS_PREFIX) => {
            let file = decode_name(&path[REPORTS_PREFIX.len()..])
                .and_then(|name| pipeline.store().report_file(&name));
            serve_file(&mut stream, file, "application/pdf")
        }
        ("GET", _) => write_html(&mut stream, 404, "<h2>Not Found</h2>\n"),
        _ => write_html(&mut stream, 405, "<h2>Method Not Allowed</h2>\n"),
    }
}

fn handle_upload(
    stream: &mut TcpStream,
    request: &HttpRequest,
    leftover: Vec<u8>,
    cfg: &WebConfig,
    pipeline: &ReportPipeline,
) -> Result<()> {
    let length = request.content_length()?;
    if length > cfg.max_upload_bytes {
        write_html(stream, 413, "<h2>Upload Too Large</h2>\n")?;
        // Drain what the client already sent so closing does not reset the
        // connection before it reads the response.
        let remaining = length.saturating_sub(leftover.len()) as u64;
        let _ = std::io::copy(&mut Read::by_ref(stream).take(remaining), &mut std::io::sink());
        return Err(anyhow!(
            "upload of {} bytes exceeds limit of {}",
            length,
            cfg.max_upload_bytes
        ));
    }
    let body = read_body(stream, leftover, length)?;

    let boundary = match request
        .headers
        .get("content-type")
        .and_then(|value| multipart::boundary(value))
    {
        Some(boundary) => boundary,
        None => {
            write_html(stream, 400, "<h2>Bad Request</h2>\n")?;
            return Err(anyhow!("upload is not multipart/form-data"));
        }
    };
    let parts = match multipart::parse(&body, &boundary) {
        Ok(parts) => parts,
        Err(err) => {
            write_html(stream, 400, "<h2>Bad Request</h2>\n")?;
            return Err(err);
        }
    };

    // No file chosen: show the untouched form.
    let (filename, data) = match multipart::file_field(parts, "file") {
        Some(upload) => upload,
        None => return write_html(stream, 200, &page::render_index(None)),
    };

    match process_upload(pipeline, &filename, &data) {
        Ok(links) => write_html(stream, 200, &page::render_index(Some(&links))),
        Err(err) => {
            log::error!("report pipeline failed for '{}': {:#}", filename, err);
            write_html(stream, 500, &page::render_error())
        }
    }
}

fn process_upload(pipeline: &ReportPipeline, filename: &str, data: &[u8]) -> Result<ResultLinks> {
    let input_path = pipeline.store().save_upload(filename, data)?;
    let paths = pipeline.run(&input_path, filename)?;
    Ok(ResultLinks {
        image_url: static_url("predictions", &paths.annotated_image)?,
        pdf_url: static_url("reports", &paths.report_document)?,
    })
}

/// Browser path under which an artifact is served.
fn static_url(kind: &str, artifact: &std::path::Path) -> Result<String> {
    let name = artifact
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| anyhow!("artifact path {} has no file name", artifact.display()))?;
    let mut url = Url::parse("http://localhost/static/")?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("static base url cannot carry a path"))?
        .pop_if_empty()
        .push(kind)
        .push(name);
    Ok(url.path().to_string())
}

fn decode_name(raw: &str) -> Option<String> {
    percent_decode_str(raw)
        .decode_utf8()
        .ok()
        .map(|name| name.into_owned())
}

fn serve_file(stream: &mut TcpStream, file: Option<PathBuf>, content_type: &str) -> Result<()> {
    match file {
        Some(path) => {
            let bytes = std::fs::read(&path)?;
            write_response(stream, 200, content_type, &bytes)
        }
        None => write_html(stream, 404, "<h2>Not Found</h2>\n"),
    }
}

fn read_head(stream: &mut TcpStream) -> Result<(HttpRequest, Vec<u8>)> {
    stream.set_read_timeout(Some(Duration::from_secs(10)))?;
    let mut buf = [0u8; 4096];
    let mut data = Vec::new();
    let header_end = loop {
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
        if data.len() > MAX_HEADER_BYTES {
            return Err(anyhow!("request header too large"));
        }
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!("connection closed before end of headers"));
        }
        data.extend_from_slice(&buf[..n]);
    };

    let text = String::from_utf8_lossy(&data[..header_end]);
    let mut lines = text.split("\r\n");
    let request_line = lines.next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().ok_or_else(|| anyhow!("missing method"))?;
    let raw_path = parts.next().ok_or_else(|| anyhow!("missing path"))?;
    let mut headers = HashMap::new();
    for line in lines {
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }
    let path = raw_path.split('?').next().unwrap_or(raw_path).to_string();
    let leftover = data[header_end + 4..].to_vec();
    Ok((
        HttpRequest {
            method: method.to_string(),
            path,
            headers,
        },
        leftover,
    ))
}

fn read_body(stream: &mut TcpStream, mut body: Vec<u8>, length: usize) -> Result<Vec<u8>> {
    let mut buf = [0u8; 16 * 1024];
    while body.len() < length {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!(
                "connection closed after {} of {} body bytes",
                body.len(),
                length
            ));
        }
        body.extend_from_slice(&buf[..n]);
    }
    body.truncate(length);
    Ok(body)
}

fn write_html(stream: &mut TcpStream, status: u16, body: &str) -> Result<()> {
    write_response(stream, status, "text/html; charset=utf-8", body.as_bytes())
}

fn write_response(
    stream: &mut TcpStream,
    status: u16,
    content_type: &str,
    body: &[u8],
) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        413 => "HTTP/1.1 413 Payload Too Large",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: {content_type}\r\nContent-Length: {len}\r\nCache-Control: no-store\r\nConnection: close\r\n\r\n",
        status_line = status_line,
        content_type = content_type,
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    stream.flush()?;
    Ok(())
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    headers: HashMap<String, String>,
}

impl HttpRequest {
    fn content_length(&self) -> Result<usize> {
        match self.headers.get("content-length") {
            Some(value) => value
                .parse()
                .map_err(|_| anyhow!("invalid Content-Length '{}'", value)),
            None => Ok(0),
        }
    }
}
