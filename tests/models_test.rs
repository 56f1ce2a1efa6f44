use yamuse_dl::models::{Codec, FormatDescriptor, Quality, Status, Transport};

#[test]
fn quality_round_trips_through_as_str() {
    for q in [Quality::Lossless, Quality::Hq, Quality::Nq] {
        assert_eq!(Quality::parse(q.as_str()), Some(q));
    }
}

#[test]
fn unknown_quality_string_does_not_parse() {
    assert!(Quality::parse("ultra").is_none());
}

#[test]
fn status_round_trips_through_as_str() {
    for s in [
        Status::Pending,
        Status::Queued,
        Status::Downloading,
        Status::Completed,
        Status::Error,
    ] {
        assert_eq!(Status::parse(s.as_str()), Some(s));
    }
}

#[test]
fn codec_lossless_set_matches_flac_family() {
    assert!(Codec::Flac.is_lossless());
    assert!(Codec::FlacMp4.is_lossless());
    assert!(!Codec::Aac.is_lossless());
    assert!(!Codec::Mp3.is_lossless());
}

#[test]
fn codec_mp4_wrapped_set() {
    assert!(Codec::FlacMp4.is_mp4_wrapped());
    assert!(Codec::AacMp4.is_mp4_wrapped());
    assert!(Codec::HeAacMp4.is_mp4_wrapped());
    assert!(!Codec::Flac.is_mp4_wrapped());
    assert!(!Codec::Mp3.is_mp4_wrapped());
}

#[test]
fn codec_extension_is_derived_not_templated() {
    assert_eq!(Codec::Flac.extension(), "flac");
    assert_eq!(Codec::FlacMp4.extension(), "flac");
    assert_eq!(Codec::Aac.extension(), "m4a");
    assert_eq!(Codec::HeAacMp4.extension(), "m4a");
    assert_eq!(Codec::Mp3.extension(), "mp3");
}

#[test]
fn codec_format_tag_groups_aac_family() {
    assert_eq!(Codec::Aac.format_tag(), "AAC");
    assert_eq!(Codec::AacMp4.format_tag(), "AAC");
    assert_eq!(Codec::HeAac.format_tag(), "AAC");
    assert_eq!(Codec::Flac.format_tag(), "FLAC");
    assert_eq!(Codec::Mp3.format_tag(), "MP3");
}

#[test]
fn codec_parse_rejects_unknown_strings() {
    assert!(Codec::parse("opus").is_none());
    assert_eq!(Codec::parse("flac-mp4"), Some(Codec::FlacMp4));
}

#[test]
fn transport_parse_round_trips() {
    assert_eq!(Transport::parse("raw"), Some(Transport::Raw));
    assert_eq!(Transport::parse("encraw"), Some(Transport::Encraw));
    assert!(Transport::parse("ftp").is_none());
}

#[test]
fn format_descriptor_resolvable_via_either_link_field() {
    let via_direct = FormatDescriptor {
        codec: Codec::Mp3,
        bitrate_kbps: 320,
        transport: Transport::Raw,
        key: None,
        direct_link: Some("https://strm.example/a".into()),
        download_info_url: None,
    };
    assert!(via_direct.has_resolvable_url());

    let via_pointer = FormatDescriptor {
        download_info_url: Some("https://example/info".into()),
        direct_link: None,
        ..via_direct.clone()
    };
    assert!(via_pointer.has_resolvable_url());

    let unresolvable = FormatDescriptor {
        direct_link: None,
        download_info_url: None,
        ..via_direct
    };
    assert!(!unresolvable.has_resolvable_url());
}
