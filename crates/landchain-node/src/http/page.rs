//! Browser view of the node
//!
//! Browsers asking for `text/html` get a single page with the transfer
//! form and the chain as a table; API clients keep getting JSON.

use axum::http::{header, HeaderMap};
use landchain_core::{Blockchain, LandRecord};
use std::fmt::Write;

/// Whether the caller prefers an HTML page
pub(crate) fn wants_html(headers: &HeaderMap) -> bool {
    headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"))
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn record_cell(out: &mut String, record: &LandRecord) {
    let _ = write!(
        out,
        "<li><b>{}</b>: {} &rarr; {} ({})",
        escape(&record.id_tanah),
        escape(&record.pemilik_lama),
        escape(&record.pemilik_baru),
        escape(&record.lokasi),
    );
    if let (Some(url), Some(hash)) = (&record.file_url, &record.file_hash) {
        let _ = write!(
            out,
            " <a href=\"{}\">certificate</a> <code>{}</code>",
            escape(url),
            escape(hash.get(..12).unwrap_or(hash)),
        );
    }
    out.push_str("</li>");
}

/// Render the index page, with `error` shown above the form
pub(crate) fn render_index(node_id: &str, chain: &Blockchain, error: Option<&str>) -> String {
    let mut out = String::with_capacity(4096);
    out.push_str(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>Land certificate ledger</title></head><body>",
    );
    let _ = write!(
        out,
        "<h1>Land certificate ledger</h1><p>Node <code>{}</code>, {} blocks, {} pending, {} peers</p>",
        escape(node_id),
        chain.len(),
        chain.pending().len(),
        chain.nodes().len(),
    );
    if let Some(error) = error {
        let _ = write!(out, "<p role=\"alert\"><b>{}</b></p>", escape(error));
    }

    out.push_str(concat!(
        "<form method=\"post\" action=\"/transactions/new\" enctype=\"multipart/form-data\">",
        "<input name=\"id_tanah\" placeholder=\"id_tanah\"> ",
        "<input name=\"pemilik_lama\" placeholder=\"pemilik_lama\"> ",
        "<input name=\"pemilik_baru\" placeholder=\"pemilik_baru\"> ",
        "<input name=\"lokasi\" placeholder=\"lokasi\"> ",
        "<input type=\"file\" name=\"file\"> ",
        "<button type=\"submit\">Submit transfer</button></form>",
        "<p><a href=\"/mine\">Mine a block</a></p>",
        "<table border=\"1\"><tr><th>#</th><th>Time</th><th>Transfers</th><th>Proof</th><th>Hash</th></tr>",
    ));
    for block in chain.blocks().iter().rev() {
        let _ = write!(
            out,
            "<tr><td>{}</td><td>{}</td><td><ul>",
            block.index,
            block.timestamp.to_rfc3339(),
        );
        if let Some(note) = &block.data.note {
            let _ = write!(out, "<li><i>{}</i></li>", escape(note));
        }
        for record in &block.data.records {
            record_cell(&mut out, record);
        }
        let _ = write!(
            out,
            "</ul></td><td>{}</td><td><code>{}</code></td></tr>",
            block.proof,
            block.hash.short(),
        );
    }
    out.push_str("</table></body></html>");
    out
}
