use std::path::Path;

use yamuse_dl::path::{build_path, expand_template, sanitize_segment, PathAttributes};

#[test]
fn expands_known_tokens() {
    let attrs = PathAttributes {
        artist: "Pink Floyd",
        title: "Breathe",
        album: "The Dark Side of the Moon",
        year: Some(1973),
        track: Some(2),
        playlist: "Favorites",
    };
    assert_eq!(
        expand_template("{artist}/{album}/{track} - {title}", &attrs),
        "Pink Floyd/The Dark Side of the Moon/02 - Breathe"
    );
    assert_eq!(expand_template("{year}", &attrs), "1973");
}

#[test]
fn unknown_tokens_resolve_to_empty() {
    let attrs = PathAttributes::default();
    assert_eq!(expand_template("{nonsense}-x", &attrs), "-x");
}

#[test]
fn sanitize_forbidden_chars_replaced_with_underscore() {
    assert_eq!(sanitize_segment("AC/DC"), "AC_DC");
    assert_eq!(sanitize_segment("What?"), "What_");
    assert_eq!(sanitize_segment("<tag>"), "_tag_");
    assert_eq!(sanitize_segment("a|b"), "a_b");
    assert_eq!(sanitize_segment("He said \"hello\""), "He said _hello_");
}

#[test]
fn sanitize_trims_whitespace() {
    assert_eq!(sanitize_segment("  Breathe  "), "Breathe");
}

#[test]
fn sanitize_truncates_to_200_chars() {
    let long = "a".repeat(300);
    let result = sanitize_segment(&long);
    assert_eq!(result.chars().count(), 200);
}

#[test]
fn build_path_joins_sanitized_segments_under_root() {
    let attrs = PathAttributes {
        artist: "AC/DC",
        title: "T.N.T.",
        album: "High Voltage",
        year: Some(1976),
        track: Some(3),
        playlist: "Rock",
    };
    let (final_path, parent) = build_path(
        Path::new("/music"),
        "{artist}/{album}",
        "{track} - {title}",
        &attrs,
        "flac",
    );
    assert_eq!(parent, Path::new("/music/AC_DC/High Voltage"));
    assert_eq!(
        final_path,
        Path::new("/music/AC_DC/High Voltage/03 - T.N.T..flac")
    );
    // No invariant-I7 character may survive in any path segment.
    for segment in final_path.to_string_lossy().split('/') {
        assert!(!segment.contains(['<', '>', ':', '"', '\\', '|', '?', '*']));
    }
}
