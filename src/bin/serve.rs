//! Development server for cshim
//!
//! Serves a directory of static files so guest binaries can be exercised in
//! the browser. `WebAssembly.compile` on a fetched body wants the
//! `application/wasm` content type, which is the one thing a generic static
//! server tends to get wrong.
//!
//! Usage: `serve [port] [root]`, defaulting to 8080 and the current
//! directory.

use std::fs;
use std::path::{Component, Path, PathBuf};
use tiny_http::{Header, Response, Server};

const DEFAULT_PORT: u16 = 8080;

fn main() {
    let mut args = std::env::args().skip(1);
    let port: u16 = args
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_PORT);
    let root = PathBuf::from(args.next().unwrap_or_else(|| ".".to_string()));

    let server = match Server::http(format!("0.0.0.0:{}", port)) {
        Ok(server) => server,
        Err(e) => {
            eprintln!("could not bind port {}: {}", port, e);
            std::process::exit(1);
        }
    };

    println!("cshim dev server");
    println!("  serving {} on http://localhost:{}", root.display(), port);

    for request in server.incoming_requests() {
        let response = match sanitize(request.url()) {
            Some(rel) => load(&root.join(rel)),
            None => not_found(),
        };
        let _ = request.respond(response);
    }
}

/// Strip the query string and reject any path that escapes the root
fn sanitize(url: &str) -> Option<PathBuf> {
    let path = url.split('?').next().unwrap_or(url);
    let path = path.trim_start_matches('/');
    let path = if path.is_empty() { "index.html" } else { path };

    let rel = Path::new(path);
    if rel
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }
    Some(rel.to_path_buf())
}

fn load(path: &Path) -> Response<std::io::Cursor<Vec<u8>>> {
    match fs::read(path) {
        Ok(contents) => {
            let mime = mime_type(path);
            match Header::from_bytes("Content-Type", mime) {
                Ok(header) => Response::from_data(contents).with_header(header),
                Err(_) => Response::from_data(contents),
            }
        }
        Err(_) => not_found(),
    }
}

fn not_found() -> Response<std::io::Cursor<Vec<u8>>> {
    Response::from_string("404 Not Found").with_status_code(404)
}

fn mime_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("js") => "application/javascript",
        Some("wasm") => "application/wasm",
        Some("css") => "text/css",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}
