/// Enclosure media formats understood by podcast clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFormat {
    M4a,
    M4v,
    Mp4,
    Mp3,
    Mov,
    Pdf,
    Epub,
    /// Content type outside the table. The episode is still published.
    Unrecognized,
}

impl MediaFormat {
    /// Maps a `Content-Type` header value to a format.
    ///
    /// Parameters such as `; charset=binary` are ignored and matching is
    /// case-insensitive.
    pub fn from_content_type(content_type: &str) -> Self {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "audio/x-m4a" => MediaFormat::M4a,
            "video/x-m4v" => MediaFormat::M4v,
            "video/mp4" => MediaFormat::Mp4,
            "audio/mpeg" => MediaFormat::Mp3,
            "video/quicktime" => MediaFormat::Mov,
            "application/pdf" => MediaFormat::Pdf,
            "document/x-epub" => MediaFormat::Epub,
            _ => MediaFormat::Unrecognized,
        }
    }

    /// MIME type written to the `type` attribute of `<enclosure>`.
    pub fn mime(self) -> &'static str {
        match self {
            MediaFormat::M4a => "audio/x-m4a",
            MediaFormat::M4v => "video/x-m4v",
            MediaFormat::Mp4 => "video/mp4",
            MediaFormat::Mp3 => "audio/mpeg",
            MediaFormat::Mov => "video/quicktime",
            MediaFormat::Pdf => "application/pdf",
            MediaFormat::Epub => "document/x-epub",
            MediaFormat::Unrecognized => "application/octet-stream",
        }
    }
}
