use std::fs;

use pretty_assertions::assert_eq;
use sitesync_engine::{image_sources, text_to_html, DocsNormalizer, MediaMap, Normalizer};
use tempfile::TempDir;

fn normalize(html: &str) -> String {
    DocsNormalizer.normalize(html, &MediaMap::new())
}

#[test]
fn strips_head_styles_and_scripts() {
    let html = r#"<html><head><title>Doc</title><style>.c1{color:red}</style>
        <meta charset="utf-8"></head>
        <body><p class="c1" style="color:red">Hello <span style="font-weight:700">world</span></p>
        <script>alert(1)</script></body></html>"#;
    let out = normalize(html);
    assert!(out.contains(r#"<p class="c1">Hello <span>world</span></p>"#), "{out}");
    assert!(!out.contains("style"));
    assert!(!out.contains("alert"));
    assert!(!out.contains("<title>"));
}

#[test]
fn empty_wrappers_are_removed() {
    let out = normalize("<body><p>Text</p><p> </p><span></span><div><span> </span></div></body>");
    assert_eq!(out, "<p>Text</p>");
}

#[test]
fn redirect_links_are_unwrapped() {
    let html = r#"<body><p><a href="https://www.google.com/url?q=https://example.com/page%3Fa%3D1&amp;sa=D&amp;ust=1">link</a></p></body>"#;
    let out = normalize(html);
    assert_eq!(out, r#"<p><a href="https://example.com/page?a=1">link</a></p>"#);
}

#[test]
fn images_are_deduplicated_and_lazy() {
    let html = r#"<body><p><img src="https://img.example.com/a.png" width="10" height="20" alt="A"></p>
        <p><img src="https://img.example.com/a.png" alt="again"></p></body>"#;
    let out = normalize(html);
    assert_eq!(out.matches("<img").count(), 1);
    assert!(out.contains(
        r#"<img src="https://img.example.com/a.png" alt="A" loading="lazy" decoding="async">"#
    ), "{out}");
    assert!(!out.contains("width"));
}

#[test]
fn images_use_local_copies_only_when_present() {
    let temp = TempDir::new().unwrap();
    let local = temp.path().join("abc.png");
    fs::write(&local, b"png").unwrap();

    let mut media = MediaMap::new();
    assert!(media.insert_if_present("https://img.example.com/a.png", "post.files/abc.png", &local));
    assert!(!media.insert_if_present(
        "https://img.example.com/b.png",
        "post.files/missing.png",
        &temp.path().join("missing.png"),
    ));
    assert_eq!(media.len(), 1);

    let html = r#"<body><img src="https://img.example.com/a.png"><img src="https://img.example.com/b.png"></body>"#;
    let out = DocsNormalizer.normalize(html, &media);
    assert!(out.contains(r#"src="post.files/abc.png""#), "{out}");
    assert!(out.contains(r#"src="https://img.example.com/b.png""#), "{out}");
}

#[test]
fn output_is_deterministic() {
    let html = r#"<body><p id="x" class="y" dir="ltr">One</p><a title="t" href="/a" rel="r">a</a></body>"#;
    assert_eq!(normalize(html), normalize(html));
    assert_eq!(
        normalize(html),
        r#"<p class="y" dir="ltr" id="x">One</p><a href="/a" rel="r" title="t">a</a>"#
    );
}

#[test]
fn plain_text_becomes_paragraphs() {
    assert_eq!(
        text_to_html("\u{feff}First line\n\n  Second & third \n"),
        "<p>First line</p>\n<p>Second &amp; third</p>"
    );
    assert_eq!(normalize("just text"), "<p>just text</p>");
}

#[test]
fn image_sources_are_distinct_and_ordered() {
    let html = r#"<p><img src="b.png"><img src="a.png"><img src="b.png"><img src=""></p>"#;
    assert_eq!(image_sources(html), vec!["b.png".to_string(), "a.png".to_string()]);
}

#[test]
fn markup_free_input_is_one_paragraph() {
    assert_eq!(normalize("line one\nline two"), "<p>line one\nline two</p>");
    assert_eq!(normalize("  \n "), "");
}

#[test]
fn text_only_parse_is_wrapped_and_escaped() {
    assert_eq!(normalize("a < b and c"), "<p>a &lt; b and c</p>");
    assert_eq!(normalize("<script>x()</script>Fish & chips"), "<p>Fish &amp; chips</p>");
}

#[test]
fn event_handlers_and_script_urls_are_dropped() {
    let html = r#"<body><p onclick="alert(1)">Hi <img src="a.png" onerror="alert(2)" alt="a">
        <a href="javascript:alert(3)" title="t">x</a> <a href=" JavaScript:alert(4)">y</a>
        <a href="https://example.com/" onmouseover="alert(5)">z</a></p></body>"#;
    let out = normalize(html);
    assert!(!out.contains("alert"), "{out}");
    assert!(!out.to_ascii_lowercase().contains("javascript"), "{out}");
    assert!(out.contains(r#"<a title="t">x</a>"#), "{out}");
    assert!(out.contains(r#"<a href="https://example.com/">z</a>"#), "{out}");
    assert!(out.contains(r#"<img src="a.png" alt="a" loading="lazy" decoding="async">"#), "{out}");
}

#[test]
fn images_without_src_are_kept_without_sizing() {
    let html = r#"<body><p><img data-src="lazy.png" width="5" alt="lazy"></p></body>"#;
    assert_eq!(
        normalize(html),
        r#"<p><img alt="lazy" data-src="lazy.png" loading="lazy" decoding="async"></p>"#
    );
}
