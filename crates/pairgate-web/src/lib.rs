//! Pairgate Web - Embedded page templates
//!
//! The pairing page is embedded into the binary and filled from the current
//! pairing state on every request.

use rust_embed::Embed;

#[derive(Embed)]
#[folder = "www/"]
pub struct Assets;

/// Template used by [`PairPage::render`]
pub const PAIR_TEMPLATE: &str = "pair.html";

/// Values shown on the pairing page
#[derive(Debug, Clone, Copy, Default)]
pub struct PairPage<'a> {
    /// QR code as a PNG data URI
    pub qr_image: Option<&'a str>,
    pub pairing_code: Option<&'a str>,
    pub session_id: Option<&'a str>,
}

impl PairPage<'_> {
    /// Render the page, or `None` if the template is missing
    pub fn render(&self) -> Option<String> {
        let template = Assets::get(PAIR_TEMPLATE)?;
        let template = String::from_utf8_lossy(&template.data).into_owned();

        let status = match (self.pairing_code, self.qr_image) {
            (Some(_), _) => "Enter this code on your phone, then download your session.",
            (None, Some(_)) => "Scan the QR code with your phone.",
            (None, None) => "Waiting for the messaging service...",
        };

        let qr_section = self
            .qr_image
            .map(|qr| {
                format!(
                    r#"    <img class="qr" src="{}" alt="Pairing QR code">"#,
                    escape_html(qr)
                )
            })
            .unwrap_or_default();

        let code_section = self
            .pairing_code
            .map(|code| format!(r#"    <p class="code">{}</p>"#, escape_html(code)))
            .unwrap_or_default();

        let download_section = self
            .session_id
            .map(|id| {
                format!(
                    r#"    <a class="download" href="/download/{}">Download session</a>"#,
                    escape_html(id)
                )
            })
            .unwrap_or_default();

        Some(
            template
                .replace("{{status}}", status)
                .replace("{{qr_section}}", &qr_section)
                .replace("{{code_section}}", &code_section)
                .replace("{{download_section}}", &download_section),
        )
    }
}

/// Escape text for HTML element and attribute content
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
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
