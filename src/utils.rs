/// Characters that are not allowed in file or directory names on NTFS
pub const UNALLOWED_CHARACTERS: [char; 9] = ['/', '\\', ':', '*', '"', '?', '<', '>', '|'];

/// Replacement for every unallowed character
pub const PLACEHOLDER: char = '_';

/// Extension given to every downloaded picture
pub const IMAGE_EXTENSION: &str = "jpg";

/// Convert arbitrary text to a filesystem-safe name
///
/// Names are not truncated: very long album titles or picture metadata
/// produce equally long names, and the filesystem may reject them.
pub fn sanitize_name(name: &str) -> String {
    name.replace(UNALLOWED_CHARACTERS, &PLACEHOLDER.to_string())
}

/// Prefix a name with its 1-based position, e.g. `[3]_Beach`
pub fn ordinal_name(index: usize, name: &str) -> String {
    format!("[{}]_{}", index + 1, name)
}

/// Directory name of the album at zero-based `index` within its site
pub fn album_dir_name(index: usize, title: &str) -> String {
    sanitize_name(&ordinal_name(index, title))
}

/// File name of the picture at zero-based `index` within its album
pub fn picture_file_name(index: usize, metadata: &str) -> String {
    format!(
        "{}.{}",
        sanitize_name(&ordinal_name(index, metadata)),
        IMAGE_EXTENSION
    )
}
