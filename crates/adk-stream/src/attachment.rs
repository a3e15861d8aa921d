use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

use crate::errors::AttachmentError;

pub const MAX_ATTACHMENT_BYTES: u64 = 20 * 1024 * 1024;

const SUPPORTED_MIME_TYPES: &[&str] = &[
    // Images
    "image/jpeg",
    "image/jpg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/svg+xml",
    "image/bmp",
    "image/tiff",
    "image/heic",
    "image/heif",
    // Documents
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "text/csv",
    "application/csv",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/vnd.oasis.opendocument.presentation",
    "application/vnd.oasis.opendocument.text",
    "application/vnd.oasis.opendocument.spreadsheet",
    "application/vnd.oasis.opendocument.graphics",
    "application/rtf",
    "text/rtf",
    "text/richtext",
    // Text and data
    "text/plain",
    "text/markdown",
    "text/xml",
    "application/xml",
    "text/yaml",
    "application/yaml",
    "text/x-yaml",
    "application/x-yaml",
    "application/json",
    "application/ld+json",
    "text/tab-separated-values",
    "application/vnd.ms-access",
    "application/toml",
    "text/x-ini",
    "text/x-properties",
    // Archives and ebooks
    "application/zip",
    "application/x-rar-compressed",
    "application/x-7z-compressed",
    "application/gzip",
    "application/x-tar",
    "application/epub+zip",
    "application/x-mobipocket-ebook",
    "application/vnd.amazon.ebook",
    // Source code
    "text/html",
    "text/css",
    "text/javascript",
    "application/javascript",
    "text/typescript",
    "application/typescript",
    "text/jsx",
    "text/tsx",
    "text/x-python",
    "application/x-python-code",
    "text/x-java-source",
    "text/x-csharp",
    "text/x-php",
    "text/x-ruby",
    "text/x-go",
    "text/x-rust",
    "text/x-kotlin",
    "text/x-swift",
    "text/x-c",
    "text/x-c++",
    "text/x-c#",
    "text/x-objective-c",
    "text/x-shellscript",
    "application/x-sh",
    // Audio and video
    "audio/mpeg",
    "audio/mp3",
    "audio/wav",
    "audio/wave",
    "audio/x-wav",
    "audio/mp4",
    "audio/m4a",
    "audio/aac",
    "audio/ogg",
    "audio/opus",
    "audio/flac",
    "audio/webm",
    "video/mp4",
    "video/webm",
    "video/ogg",
    "video/quicktime",
    "video/x-msvideo",
];

const SUPPORTED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "svg", "bmp", "tiff", "heic", "heif", "pdf", "doc",
    "docx", "odt", "rtf", "xls", "xlsx", "ods", "csv", "tsv", "ppt", "pptx", "odp", "txt", "md",
    "markdown", "xml", "yaml", "yml", "json", "toml", "ini", "html", "css", "js", "jsx", "ts",
    "tsx", "py", "java", "c", "cpp", "h", "hpp", "cs", "php", "rb", "go", "rs", "kt", "swift",
    "sh", "bash", "mp3", "wav", "ogg", "opus", "flac", "m4a", "aac", "webm", "mp4", "mov", "avi",
    "zip", "rar", "7z", "tar", "gz", "epub", "mobi", "azw", "azw3",
];

/// A file ready to be sent inline with a user message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub display_name: String,
    /// Standard base64 of the file contents
    pub data: String,
    pub mime_type: String,
}

impl Attachment {
    pub fn from_bytes<S: Into<String>, T: Into<String>>(
        display_name: S,
        mime_type: T,
        bytes: &[u8],
    ) -> Self {
        Attachment {
            display_name: display_name.into(),
            data: STANDARD.encode(bytes),
            mime_type: mime_type.into(),
        }
    }

    /// Read, validate and encode a file from disk
    pub fn from_path(path: &Path) -> Result<Self, AttachmentError> {
        let display_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let io_error = |source| AttachmentError::Io {
            name: display_name.clone(),
            source,
        };
        let size = std::fs::metadata(path).map_err(io_error)?.len();
        let mime_type = mime_type_for(&display_name).unwrap_or_default();
        validate(&display_name, &mime_type, size)?;

        let bytes = std::fs::read(path).map_err(io_error)?;
        Ok(Attachment::from_bytes(display_name, mime_type, &bytes))
    }
}

/// Check size, then accept a known MIME type or fall back to the file extension
pub fn validate(name: &str, mime_type: &str, size: u64) -> Result<(), AttachmentError> {
    if size > MAX_ATTACHMENT_BYTES {
        return Err(AttachmentError::TooLarge {
            name: name.to_string(),
            size,
        });
    }

    if SUPPORTED_MIME_TYPES.contains(&mime_type) {
        return Ok(());
    }

    let extension = extension_of(name);
    if let Some(extension) = &extension {
        if SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
            return Ok(());
        }
    }

    Err(AttachmentError::Unsupported {
        mime_type: if mime_type.is_empty() {
            "unknown".to_string()
        } else {
            mime_type.to_string()
        },
        extension: extension
            .map(|extension| format!(".{}", extension))
            .unwrap_or_else(|| "no extension".to_string()),
    })
}

/// Best-effort MIME type for a file name, based on its extension
pub fn mime_type_for(name: &str) -> Option<String> {
    let mime_type = match extension_of(name)?.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "bmp" => "image/bmp",
        "tiff" => "image/tiff",
        "heic" => "image/heic",
        "heif" => "image/heif",
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "odt" => "application/vnd.oasis.opendocument.text",
        "ods" => "application/vnd.oasis.opendocument.spreadsheet",
        "odp" => "application/vnd.oasis.opendocument.presentation",
        "rtf" => "application/rtf",
        "csv" => "text/csv",
        "tsv" => "text/tab-separated-values",
        "txt" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "xml" => "application/xml",
        "yaml" | "yml" => "application/yaml",
        "json" => "application/json",
        "toml" => "application/toml",
        "html" => "text/html",
        "css" => "text/css",
        "js" => "text/javascript",
        "ts" => "text/typescript",
        "py" => "text/x-python",
        "rs" => "text/x-rust",
        "go" => "text/x-go",
        "sh" | "bash" => "application/x-sh",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "webm" => "video/webm",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "epub" => "application/epub+zip",
        _ => return None,
    };
    Some(mime_type.to_string())
}

fn extension_of(name: &str) -> Option<String> {
    let (_, extension) = name.rsplit_once('.')?;
    if extension.is_empty() {
        None
    } else {
        Some(extension.to_lowercase())
    }
}
