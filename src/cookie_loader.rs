use std::fs;
use std::io;
use std::path::Path;
use log::debug;

/// `expiry` is epoch seconds; `None` marks a session cookie.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieRecord {
    pub domain: String,
    pub path: String,
    pub name: String,
    pub value: String,
    pub secure: bool,
    pub expiry: Option<i64>,
}

/// Parses one tab-separated line in the Netscape layout:
/// domain, flag, path, secure, expiry, name, value.
pub fn parse_cookie_line(line: &str) -> Option<CookieRecord> {
    let parts: Vec<&str> = line.split('\t').collect();
    if parts.len() < 7 {
        return None;
    }

    // An expiry of "0", an empty field, or unparseable text all mean a
    // session cookie.
    let expiry_field = parts[4];
    let expiry = if !expiry_field.is_empty() && expiry_field != "0" {
        expiry_field.parse::<i64>().ok()
    } else {
        None
    };

    Some(CookieRecord {
        domain: parts[0].to_string(),
        path: parts[2].to_string(),
        name: parts[5].to_string(),
        value: parts[6].to_string(),
        secure: parts[3].eq_ignore_ascii_case("true"),
        expiry,
    })
}

/// Reads a whole cookie file. Comment, blank, and malformed lines are
/// skipped; only an unreadable file is an error.
pub fn load_cookie_file<P: AsRef<Path>>(filename: P) -> io::Result<Vec<CookieRecord>> {
    let content = fs::read_to_string(filename.as_ref())?;

    let mut records = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_cookie_line(line) {
            Some(record) => records.push(record),
            None => debug!("Skipping malformed cookie line: {:?}", line),
        }
    }
    Ok(records)
}
