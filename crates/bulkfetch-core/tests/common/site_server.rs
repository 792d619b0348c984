//! Minimal HTTP/1.1 site with a cookie login, for end-to-end tests.
//!
//! Routes:
//! - `POST /login` with `login` and `password` form fields. Sets
//!   `JSESSIONID` on success. In relay mode it answers with a page of hidden
//!   inputs instead, and `POST /relay` sets the cookie.
//! - `GET /file/<id>`: 302 to `/login` without a current, unexpired
//!   session; 403 for forbidden ids; otherwise 200 with the file body.

use std::collections::HashSet;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use super::body_for;

pub const USER: &str = "105123";
pub const PASSWORD: &str = "p&ss word";
const RELAY_TOKEN: &str = "assertion&1";

#[derive(Debug, Clone, Default)]
pub struct SiteOptions {
    /// Successful downloads per session before it expires.
    pub expire_after: Option<u32>,
    pub forbidden: HashSet<i64>,
    /// Ids served with `Content-Disposition: attachment; filename="doc<id>.pdf"`.
    pub disposition: HashSet<i64>,
    /// Login goes through an intermediate page of hidden inputs.
    pub relay: bool,
}

#[derive(Default)]
struct Sessions {
    generation: u32,
    served: u32,
}

pub struct SiteServer {
    pub base: String,
    logins: Arc<AtomicU32>,
}

impl SiteServer {
    pub fn logins(&self) -> u32 {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path.trim_start_matches('/'))
    }
}

/// Starts the server on an ephemeral port. Runs until the process exits.
pub fn start(opts: SiteOptions) -> SiteServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let logins = Arc::new(AtomicU32::new(0));
    let sessions = Arc::new(Mutex::new(Sessions::default()));
    let opts = Arc::new(opts);
    {
        let logins = Arc::clone(&logins);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let (logins, sessions, opts) = (Arc::clone(&logins), Arc::clone(&sessions), Arc::clone(&opts));
                thread::spawn(move || handle(stream, &opts, &sessions, &logins));
            }
        });
    }
    SiteServer {
        base: format!("http://127.0.0.1:{}/", port),
        logins,
    }
}

struct Request {
    method: String,
    path: String,
    cookie: Option<String>,
    body: String,
}

fn read_request(stream: &mut TcpStream) -> Option<Request> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.lines();
    let mut first = lines.next()?.split_whitespace();
    let method = first.next()?.to_string();
    let path = first.next()?.to_string();
    let mut content_length = 0usize;
    let mut cookie = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            } else if name.eq_ignore_ascii_case("cookie") {
                cookie = Some(value.trim().to_string());
            }
        }
    }
    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let end = (header_end + content_length).min(buf.len());
    let body = String::from_utf8_lossy(&buf[header_end..end]).into_owned();
    Some(Request {
        method,
        path,
        cookie,
        body,
    })
}

fn form_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("");
                match u8::from_str_radix(hex, 16) {
                    Ok(b) => {
                        out.push(b);
                        i += 2;
                    }
                    Err(_) => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn form_field(body: &str, name: &str) -> Option<String> {
    body.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=')?;
        (form_decode(k) == name).then(|| form_decode(v))
    })
}

fn session_cookie(cookie: Option<&str>) -> Option<&str> {
    cookie?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("JSESSIONID="))
}

fn respond(stream: &mut TcpStream, status: &str, headers: &[String], body: &[u8]) {
    let mut head = format!("HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n", status, body.len());
    for h in headers {
        head.push_str(h);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
    let _ = stream.flush();
}

fn new_session(sessions: &Mutex<Sessions>, logins: &AtomicU32) -> String {
    logins.fetch_add(1, Ordering::SeqCst);
    let mut s = sessions.lock().unwrap();
    s.generation += 1;
    s.served = 0;
    format!("Set-Cookie: JSESSIONID=s{}; Path=/", s.generation)
}

fn handle(mut stream: TcpStream, opts: &SiteOptions, sessions: &Mutex<Sessions>, logins: &AtomicU32) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let Some(req) = read_request(&mut stream) else {
        return;
    };

    match (req.method.as_str(), req.path.as_str()) {
        ("POST", "/login") => {
            let ok = form_field(&req.body, "login").as_deref() == Some(USER)
                && form_field(&req.body, "password").as_deref() == Some(PASSWORD);
            if !ok {
                respond(&mut stream, "200 OK", &[], b"<html>invalid credentials</html>");
            } else if opts.relay {
                let page = format!(
                    "<html><form action=\"/relay\" method=\"post\">\
                     <input type=\"hidden\" name=\"RelayState\" value=\"cookie:1\"/>\
                     <input type=\"hidden\" name=\"SAMLResponse\" value=\"{}\"/>\
                     </form></html>",
                    RELAY_TOKEN.replace('&', "&amp;")
                );
                respond(&mut stream, "200 OK", &[], page.as_bytes());
            } else {
                let cookie = new_session(sessions, logins);
                respond(&mut stream, "200 OK", &[cookie], b"<html>welcome</html>");
            }
        }
        ("POST", "/relay") => {
            if form_field(&req.body, "SAMLResponse").as_deref() == Some(RELAY_TOKEN) {
                let cookie = new_session(sessions, logins);
                respond(&mut stream, "200 OK", &[cookie], b"<html>welcome</html>");
            } else {
                respond(&mut stream, "200 OK", &[], b"<html>relay failed</html>");
            }
        }
        ("GET", path) if path.starts_with("/file/") => {
            let id: i64 = path["/file/".len()..].parse().unwrap_or(-1);
            let mut s = sessions.lock().unwrap();
            let current = format!("s{}", s.generation);
            let valid = s.generation > 0
                && session_cookie(req.cookie.as_deref()) == Some(current.as_str())
                && opts.expire_after.map_or(true, |n| s.served < n);
            if !valid {
                drop(s);
                respond(&mut stream, "302 Found", &["Location: /login".to_string()], b"");
            } else if opts.forbidden.contains(&id) {
                drop(s);
                respond(&mut stream, "403 Forbidden", &[], b"forbidden");
            } else {
                s.served += 1;
                drop(s);
                let mut headers = vec!["Content-Type: application/octet-stream".to_string()];
                if opts.disposition.contains(&id) {
                    headers.push(format!("Content-Disposition: attachment; filename=\"doc{}.pdf\"", id));
                }
                respond(&mut stream, "200 OK", &headers, &body_for(id));
            }
        }
        _ => respond(&mut stream, "404 Not Found", &[], b""),
    }
}
