//! HTML pages.
//!
//! Every user-supplied string goes through [`escape_html`] before it is
//! placed in a page.

use std::fmt::Write;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use warp::http::StatusCode;

use crate::storage::types::{Attachment, Entry};

// RFC 3986 unreserved characters stay as they are.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Encodes one URL path segment.
pub fn path_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

pub fn entry_url(resid: &str) -> String {
    format!("/view/{}", path_segment(resid))
}

pub fn upload_url(filename: &str) -> String {
    format!("/uploads/{}", path_segment(filename))
}

fn layout(logged_in: bool, flashes: &[String], body: &str) -> String {
    let nav = if logged_in {
        r#"<a href="/logout">log out</a>"#
    } else {
        r#"<a href="/login">log in</a>"#
    };
    let mut flash_html = String::new();
    for message in flashes {
        let _ = write!(flash_html, "<div class=flash>{}</div>", escape_html(message));
    }
    format!(
        r#"<!doctype html>
<title>Microblog</title>
<link rel=stylesheet type=text/css href="/static/style.css">
<div class=page>
  <h1><a href="/">Microblog</a></h1>
  <div class=metanav>{nav}</div>
  {flash_html}
  {body}
</div>
"#
    )
}

pub fn show_entries(entries: &[Entry], logged_in: bool, flashes: &[String]) -> String {
    let mut body = String::new();
    if logged_in {
        body.push_str(
            r#"<form action="/add" method=post class=add-entry>
    <dl>
      <dt>Title:
      <dd><input type=text size=30 name=title>
      <dt>Text:
      <dd><textarea name=text rows=5 cols=40></textarea>
      <dd><input type=submit value=Share>
    </dl>
  </form>"#,
        );
    }
    body.push_str("<ul class=entries>");
    if entries.is_empty() {
        body.push_str("<li><em>Unbelievable.  No entries here so far</em>");
    }
    for entry in entries {
        let _ = write!(
            body,
            r#"<li><h2><a href="{}">{}</a></h2>{}"#,
            escape_html(&entry_url(&entry.resid)),
            escape_html(&entry.title),
            escape_html(&entry.text)
        );
    }
    body.push_str("</ul>");
    layout(logged_in, flashes, &body)
}

pub fn show_files(
    entry: &Entry,
    files: &[Attachment],
    logged_in: bool,
    flashes: &[String],
) -> String {
    let mut body = format!(
        "<h2>{}</h2><div class=entry-text>{}</div>",
        escape_html(&entry.title),
        escape_html(&entry.text)
    );
    if logged_in {
        let _ = write!(
            body,
            r#"<form action="/upload" method=post enctype=multipart/form-data class=add-entry>
    <input type=hidden name=resid value="{}">
    <dl>
      <dt>Title:
      <dd><input type=text size=30 name=title>
      <dt>File:
      <dd><input type=file name=file>
      <dd><input type=submit value=Upload>
    </dl>
  </form>"#,
            escape_html(&entry.resid)
        );
    }
    body.push_str("<ul class=entries>");
    if files.is_empty() {
        body.push_str("<li><em>No attachments</em>");
    }
    for file in files {
        let _ = write!(
            body,
            r#"<li><a href="{}">{}</a> <span class=filename>{}</span>"#,
            escape_html(&upload_url(&file.filename)),
            escape_html(&file.title),
            escape_html(&file.filename)
        );
    }
    body.push_str("</ul>");
    layout(logged_in, flashes, &body)
}

pub fn login(error: Option<&str>, logged_in: bool, flashes: &[String]) -> String {
    let mut body = String::from("<h2>Login</h2>");
    if let Some(error) = error {
        let _ = write!(
            body,
            "<p class=error><strong>Error:</strong> {}",
            escape_html(error)
        );
    }
    body.push_str(
        r#"<form action="/login" method=post>
    <dl>
      <dt>Username:
      <dd><input type=text name=username>
      <dt>Password:
      <dd><input type=password name=password>
      <dd><input type=submit value=Login>
    </dl>
  </form>"#,
    );
    layout(logged_in, flashes, &body)
}

pub fn error_page(status: StatusCode, message: &str) -> String {
    let reason = status.canonical_reason().unwrap_or("Error");
    format!(
        "<!doctype html>\n<title>{} {}</title>\n<h1>{}</h1>\n<p>{}</p>\n",
        status.as_u16(),
        reason,
        reason,
        escape_html(message)
    )
}
