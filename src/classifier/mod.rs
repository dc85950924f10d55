//! Hit classification.
//!
//! Pure predicates over a hit's URL, user agent and status. None of them
//! fail: empty input classifies as not ignored, not downloadable and
//! allowed.

/// Asset extensions that are never tracked.
pub const IGNORED_EXTENSIONS: &[&str] = &[
    ".jpeg", ".jpg", ".woff", ".woff2", ".ttf", ".gif", ".png", ".webp", ".svg", ".ico", ".js",
    ".css", ".bmp", ".svgz", ".otf", ".eot", ".xml",
];

/// Extensions reported as downloads.
pub const DOWNLOAD_EXTENSIONS: &[&str] = &[
    ".7z", ".aac", ".apk", ".arc", ".arj", ".asf", ".asx", ".avi", ".azw3", ".bin", ".bz2", ".csv",
    ".deb", ".dmg", ".doc", ".docx", ".epub", ".exe", ".flac", ".flv", ".gz", ".gzip", ".hqx",
    ".ibooks", ".jar", ".json", ".md5", ".mov", ".movie", ".mp2", ".mp3", ".mp4", ".mpg", ".mpeg",
    ".mobi", ".msi", ".msp", ".odb", ".odf", ".odg", ".odp", ".ods", ".odt", ".ogg", ".ogv", ".pdf",
    ".phps", ".ppt", ".pptx", ".qt", ".qtm", ".ra", ".ram", ".rar", ".rpm", ".rtf", ".sea", ".sig",
    ".sit", ".tar", ".tbz", ".tgz", ".torrent", ".txt", ".wav", ".webm", ".wma", ".wmv", ".wpd",
    ".xls", ".xlsx", ".xml", ".xsd", ".z", ".zip",
];

/// Client and server error statuses routed to the error channel.
///
/// Shared by delivery and error routing so the two cannot drift apart.
pub const ERROR_STATUS_CODES: &[&str] = &[
    "400", "401", "402", "403", "404", "405", "406", "407", "408", "409", "410", "411", "412",
    "413", "414", "415", "416", "417", "418", "421", "425", "426", "428", "429", "431", "451",
    "500", "501", "502", "503", "504", "505", "506", "510", "511",
];

fn strip_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(path, _)| path)
}

fn has_extension(url: &str, extensions: &[&str]) -> bool {
    let path = strip_query(url).to_ascii_lowercase();
    extensions.iter().any(|ext| path.ends_with(ext))
}

/// Static assets, `robots.txt` and autodiscover probes.
pub fn is_ignored(url: &str) -> bool {
    let path = strip_query(url);
    if path.contains("robots.txt") || path.to_ascii_lowercase().contains("autodiscover") {
        return true;
    }
    has_extension(url, IGNORED_EXTENSIONS)
}

pub fn is_downloadable(url: &str) -> bool {
    has_extension(url, DOWNLOAD_EXTENSIONS)
}

/// An empty allow-list tracks every user agent; otherwise any entry must
/// occur as a substring of `user_agent`.
pub fn user_agent_allowed<S: AsRef<str>>(user_agent: &str, allow_list: &[S]) -> bool {
    allow_list.is_empty()
        || allow_list
            .iter()
            .any(|allowed| user_agent.contains(allowed.as_ref()))
}

/// True when `url` contains any configured excluded substring.
pub fn is_excluded<S: AsRef<str>>(url: &str, excluded: &[S]) -> bool {
    excluded
        .iter()
        .map(AsRef::as_ref)
        .filter(|needle| !needle.is_empty())
        .any(|needle| url.contains(needle))
}

pub fn is_error_status(status: &str) -> bool {
    ERROR_STATUS_CODES.contains(&status)
}

/// The three per-hit judgments, computed fresh for every hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub ignored: bool,
    pub is_download: bool,
    pub user_agent_allowed: bool,
}

impl Classification {
    pub fn of<S: AsRef<str>>(url: &str, user_agent: &str, allow_list: &[S]) -> Self {
        Self {
            ignored: is_ignored(url),
            is_download: is_downloadable(url),
            user_agent_allowed: user_agent_allowed(user_agent, allow_list),
        }
    }
}
