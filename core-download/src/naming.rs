//! File naming and size formatting for downloaded albums

use core_library::Song;

/// Characters that are unsafe in file names on at least one platform
const FORBIDDEN: &[char] = &[':', '/', '\\', '?', '%', '*', '|', '"', '<', '>'];

const MAX_TITLE_CHARS: usize = 50;

/// Extension every downloaded song is written with
pub const SONG_EXTENSION: &str = "mp3";

/// Strip forbidden characters and cap the length at 50 characters.
pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !FORBIDDEN.contains(c))
        .take(MAX_TITLE_CHARS)
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        "Untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// `NN - <title>.mp3`; `position` (1-based) stands in for a missing track number
pub fn song_file_name(song: &Song, position: usize) -> String {
    let track = song.track.map(|t| t as usize).unwrap_or(position);
    format!(
        "{:02} - {}.{}",
        track,
        sanitize_title(song.display_title()),
        SONG_EXTENSION
    )
}

/// Legacy flat layout: `Downloads/<songId>.mp3`
pub fn legacy_file_name(song_id: &str) -> String {
    format!("{}.{}", song_id, SONG_EXTENSION)
}

/// Decimal megabytes, e.g. `"2.9 MB"`. Sizes under 1 MB keep three decimals
/// so small totals are not shown as zero.
pub fn format_megabytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 MB".to_string();
    }
    let mb = bytes as f64 / 1_000_000.0;
    if mb >= 1.0 {
        format!("{:.1} MB", mb)
    } else {
        format!("{:.3} MB", mb)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_forbidden_characters() {
        assert_eq!(sanitize_title(r#"AC/DC: "Live" <1991>?*|%\"#), "ACDC Live 1991");
    }

    #[test]
    fn test_sanitize_truncates_to_fifty_chars() {
        let long = "x".repeat(80);
        assert_eq!(sanitize_title(&long).chars().count(), 50);

        let accented = "é".repeat(60);
        assert_eq!(sanitize_title(&accented).chars().count(), 50);
    }

    #[test]
    fn test_sanitize_never_returns_empty() {
        assert_eq!(sanitize_title("???"), "Untitled");
    }

    #[test]
    fn test_song_file_name_uses_track_number() {
        let song = Song {
            id: "s1".into(),
            title: "So What".into(),
            track: Some(3),
            ..Default::default()
        };
        assert_eq!(song_file_name(&song, 1), "03 - So What.mp3");

        let untracked = Song {
            id: "s2".into(),
            title: "Intro".into(),
            ..Default::default()
        };
        assert_eq!(song_file_name(&untracked, 7), "07 - Intro.mp3");
    }

    #[test]
    fn test_format_megabytes() {
        assert_eq!(format_megabytes(0), "0 MB");
        assert_eq!(format_megabytes(3000), "0.003 MB");
        assert_eq!(format_megabytes(2_900_000), "2.9 MB");
        assert_eq!(format_megabytes(150_260_000), "150.3 MB");
    }
}
