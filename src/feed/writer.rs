use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::{Cursor, Write};
use std::path::Path;

use super::channel::Channel;
use super::duration::parse_duration;
use super::episode::EpisodeRecord;
use crate::util::strip_invalid_xml_chars;

const ITUNES_NS: &str = "http://www.itunes.com/dtds/podcast-1.0.dtd";
const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
const SY_NS: &str = "http://purl.org/rss/1.0/modules/syndication/";

/// Apple truncates `itunes:subtitle` beyond this.
const MAX_SUBTITLE_CHARS: usize = 255;

type XmlWriter = Writer<Cursor<Vec<u8>>>;

/// Escapes `& < > ' "` and drops characters XML 1.0 cannot carry.
///
/// # Examples
///
/// ```
/// use gadio_feed::feed::escape_text;
///
/// assert_eq!(escape_text("Q&A <live>"), "Q&amp;A &lt;live&gt;");
/// assert_eq!(escape_text(r#"'quoted' "text""#), "&apos;quoted&apos; &quot;text&quot;");
/// ```
pub fn escape_text(text: &str) -> String {
    quick_xml::escape::escape(strip_invalid_xml_chars(text).as_ref()).into_owned()
}

/// Renders the channel envelope around `episodes`, in the order given.
///
/// The caller passes episodes already drained from the aggregator
/// (newest first); this function performs no I/O.
pub fn render_feed(
    channel: &Channel,
    episodes: &[EpisodeRecord],
    build_time: DateTime<Utc>,
) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .context("Failed to write XML declaration")?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    rss.push_attribute(("xmlns:itunes", ITUNES_NS));
    rss.push_attribute(("xmlns:atom", ATOM_NS));
    rss.push_attribute(("xmlns:sy", SY_NS));
    writer
        .write_event(Event::Start(rss))
        .context("Failed to write rss element")?;
    start(&mut writer, "channel", &[])?;

    write_channel_metadata(&mut writer, channel, build_time)?;

    for episode in episodes {
        write_item(&mut writer, channel, episode)?;
    }

    end(&mut writer, "channel")?;
    end(&mut writer, "rss")?;

    let bytes = writer.into_inner().into_inner();
    String::from_utf8(bytes).context("Generated feed contains invalid UTF-8")
}

fn write_channel_metadata(
    w: &mut XmlWriter,
    channel: &Channel,
    build_time: DateTime<Utc>,
) -> Result<()> {
    text_element(w, "title", &channel.title)?;
    text_element(w, "link", &channel.link)?;
    if let Some(self_link) = &channel.self_link {
        empty(
            w,
            "atom:link",
            &[
                ("href", self_link.as_str()),
                ("rel", "self"),
                ("type", "application/rss+xml"),
            ],
        )?;
    }
    text_element(w, "description", &channel.description)?;
    text_element(w, "category", &channel.category)?;
    text_element(w, "generator", &channel.generator)?;
    text_element(w, "language", &channel.language)?;
    text_element(w, "copyright", &channel.copyright)?;
    text_element(w, "managingEditor", &channel.managing_editor)?;
    text_element(w, "pubDate", &channel.published.to_rfc2822())?;
    text_element(w, "lastBuildDate", &build_time.to_rfc2822())?;

    start(w, "image", &[])?;
    text_element(w, "url", &channel.image)?;
    text_element(w, "title", &channel.title)?;
    text_element(w, "link", &channel.link)?;
    end(w, "image")?;

    text_element(w, "sy:updatePeriod", &channel.update_period)?;
    text_element(w, "sy:updateFrequency", &channel.update_frequency.to_string())?;

    text_element(w, "itunes:author", &channel.owner_name)?;
    text_element(w, "itunes:subtitle", &channel.subtitle)?;
    text_element(w, "itunes:summary", &channel.description)?;
    if !channel.keywords.is_empty() {
        text_element(w, "itunes:keywords", &channel.keywords.join(","))?;
    }
    start(w, "itunes:owner", &[])?;
    text_element(w, "itunes:name", &channel.owner_name)?;
    text_element(w, "itunes:email", &channel.owner_email)?;
    end(w, "itunes:owner")?;
    text_element(
        w,
        "itunes:explicit",
        if channel.explicit { "true" } else { "false" },
    )?;
    empty(w, "itunes:image", &[("href", channel.image.as_str())])?;

    start(w, "itunes:category", &[("text", channel.category.as_str())])?;
    if !channel.subcategory.is_empty() {
        empty(w, "itunes:category", &[("text", channel.subcategory.as_str())])?;
    }
    end(w, "itunes:category")
}

fn write_item(w: &mut XmlWriter, channel: &Channel, episode: &EpisodeRecord) -> Result<()> {
    start(w, "item", &[])?;

    text_element(w, "title", &episode.display_title())?;
    text_element(w, "link", &episode.link)?;
    if channel.cdata_descriptions {
        cdata_element(w, "description", &episode.summary)?;
    } else {
        text_element(w, "description", &episode.summary)?;
    }
    text_element(w, "pubDate", &episode.published.to_rfc2822())?;

    start(w, "guid", &[("isPermaLink", "false")])?;
    text(w, &episode.enclosure.url)?;
    end(w, "guid")?;

    let length = episode.enclosure.length.to_string();
    empty(
        w,
        "enclosure",
        &[
            ("url", episode.enclosure.url.as_str()),
            ("length", length.as_str()),
            ("type", episode.enclosure.format.mime()),
        ],
    )?;

    text_element(w, "itunes:author", &channel.owner_name)?;
    text_element(w, "itunes:subtitle", &subtitle(&episode.summary))?;
    text_element(w, "itunes:summary", &episode.summary)?;
    if let Some(cover) = &episode.cover {
        empty(w, "itunes:image", &[("href", cover.as_str())])?;
    }
    text_element(
        w,
        "itunes:duration",
        &parse_duration(&episode.duration).to_string(),
    )?;

    end(w, "item")
}

/// First non-empty line of the summary, capped at [`MAX_SUBTITLE_CHARS`].
fn subtitle(summary: &str) -> String {
    summary
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .chars()
        .take(MAX_SUBTITLE_CHARS)
        .collect()
}

fn start(w: &mut XmlWriter, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
    let mut element = BytesStart::new(name);
    for &(key, value) in attrs {
        element.push_attribute((key, strip_invalid_xml_chars(value).as_ref()));
    }
    w.write_event(Event::Start(element))
        .with_context(|| format!("Failed to write <{name}>"))?;
    Ok(())
}

fn empty(w: &mut XmlWriter, name: &str, attrs: &[(&str, &str)]) -> Result<()> {
    let mut element = BytesStart::new(name);
    for &(key, value) in attrs {
        element.push_attribute((key, strip_invalid_xml_chars(value).as_ref()));
    }
    w.write_event(Event::Empty(element))
        .with_context(|| format!("Failed to write <{name}/>"))?;
    Ok(())
}

fn end(w: &mut XmlWriter, name: &str) -> Result<()> {
    w.write_event(Event::End(BytesEnd::new(name)))
        .with_context(|| format!("Failed to write </{name}>"))?;
    Ok(())
}

fn text(w: &mut XmlWriter, content: &str) -> Result<()> {
    w.write_event(Event::Text(BytesText::from_escaped(escape_text(content))))
        .context("Failed to write text")?;
    Ok(())
}

fn text_element(w: &mut XmlWriter, name: &str, content: &str) -> Result<()> {
    start(w, name, &[])?;
    text(w, content)?;
    end(w, name)
}

/// Writes `content` as CDATA, splitting at any `]]>` it contains.
fn cdata_element(w: &mut XmlWriter, name: &str, content: &str) -> Result<()> {
    let content = strip_invalid_xml_chars(content);
    let mut sections = String::with_capacity(content.len() + 12);
    let mut rest = content.as_ref();
    while let Some(idx) = rest.find("]]>") {
        sections.push_str("<![CDATA[");
        sections.push_str(&rest[..idx + 2]);
        sections.push_str("]]>");
        rest = &rest[idx + 2..];
    }
    sections.push_str("<![CDATA[");
    sections.push_str(rest);
    sections.push_str("]]>");

    start(w, name, &[])?;
    // Already well-formed markup; written as a pre-escaped text run
    w.write_event(Event::Text(BytesText::from_escaped(sections)))
        .context("Failed to write CDATA section")?;
    end(w, name)
}

/// Writes the feed to `path` atomically.
///
/// Content goes to a hidden temporary file next to the destination, is
/// synced to disk, then renamed over the destination, so readers never see
/// a partial feed. Missing parent directories are created. On failure the
/// temporary file is removed and any existing feed is left untouched.
pub fn write_feed(path: &Path, xml: &str) -> Result<()> {
    let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) => {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create output directory '{}'", parent.display())
            })?;
            parent
        }
        None => Path::new("."),
    };

    let file_name = path
        .file_name()
        .with_context(|| format!("Feed path '{}' has no file name", path.display()))?;
    let temp_path = dir.join(format!(
        ".{}.{}-{:08x}.tmp",
        file_name.to_string_lossy(),
        std::process::id(),
        rand::random::<u32>()
    ));

    let written = write_synced(&temp_path, xml.as_bytes())
        .with_context(|| format!("Failed to write temporary feed '{}'", temp_path.display()))
        .and_then(|()| {
            std::fs::rename(&temp_path, path).with_context(|| {
                format!(
                    "Failed to move '{}' into place at '{}'",
                    temp_path.display(),
                    path.display()
                )
            })
        });
    if written.is_err() {
        let _ = std::fs::remove_file(&temp_path);
    }
    written
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    // create_new refuses to follow a pre-existing file or symlink
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelConfig;
    use crate::feed::episode::fixtures::episode;
    use crate::feed::media::MediaFormat;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn channel() -> Channel {
        Channel::from_config(&ChannelConfig::default()).unwrap()
    }

    fn build_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
    }

    fn parse(xml: &str) -> feed_rs::model::Feed {
        feed_rs::parser::parse(xml.as_bytes()).expect("emitted feed should parse")
    }

    #[test]
    fn test_items_keep_given_order() {
        let episodes = vec![episode("newest", 3_000), episode("oldest", 1_000)];
        let xml = render_feed(&channel(), &episodes, build_time()).unwrap();

        let feed = parse(&xml);
        let titles: Vec<String> = feed
            .entries
            .iter()
            .map(|e| e.title.as_ref().unwrap().content.clone())
            .collect();
        assert_eq!(titles, vec!["newest | Gadio Pro", "oldest | Gadio Pro"]);
    }

    #[test]
    fn test_item_fields() {
        let mut record = episode("Ep", 1_700_000_000);
        record.cover = Some("https://img.example.com/c.jpg".to_string());
        record.duration = "1:22:18".to_string();
        record.enclosure.format = MediaFormat::Unrecognized;
        record.enclosure.length = 123_456;
        let xml = render_feed(&channel(), &[record.clone()], build_time()).unwrap();

        assert!(xml.contains(&format!(
            r#"<guid isPermaLink="false">{}</guid>"#,
            record.enclosure.url
        )));
        assert!(xml.contains(&format!(
            r#"<enclosure url="{}" length="123456" type="application/octet-stream"/>"#,
            record.enclosure.url
        )));
        assert!(xml.contains("<itunes:duration>4938</itunes:duration>"));
        assert!(xml.contains(r#"<itunes:image href="https://img.example.com/c.jpg"/>"#));
        assert!(xml.contains(&format!(
            "<pubDate>{}</pubDate>",
            record.published.to_rfc2822()
        )));

        let feed = parse(&xml);
        let entry = &feed.entries[0];
        assert_eq!(entry.id, record.enclosure.url);
        assert_eq!(entry.published, Some(record.published));
    }

    #[test]
    fn test_reserved_characters_escaped_and_decoded() {
        let mut record = episode(r#"Tom & "Jerry" <live> 'special'"#, 10);
        record.summary = "Q&A: 1 < 2 > 0".to_string();
        let xml = render_feed(&channel(), &[record], build_time()).unwrap();

        assert!(xml.contains(
            "<title>Tom &amp; &quot;Jerry&quot; &lt;live&gt; &apos;special&apos; | Gadio Pro</title>"
        ));
        assert!(xml.contains("<description>Q&amp;A: 1 &lt; 2 &gt; 0</description>"));

        let feed = parse(&xml);
        let entry = &feed.entries[0];
        assert_eq!(
            entry.title.as_ref().unwrap().content,
            r#"Tom & "Jerry" <live> 'special' | Gadio Pro"#
        );
        assert_eq!(entry.summary.as_ref().unwrap().content, "Q&A: 1 < 2 > 0");
    }

    #[test]
    fn test_cdata_descriptions() {
        let mut config = ChannelConfig::default();
        config.cdata_descriptions = true;
        let channel = Channel::from_config(&config).unwrap();

        let mut plain = episode("Plain", 20);
        plain.summary = "<b>bold</b> & more".to_string();
        let mut split = episode("Split", 10);
        split.summary = "before ]]> after".to_string();
        let xml = render_feed(&channel, &[plain, split], build_time()).unwrap();

        assert!(xml.contains("<description><![CDATA[<b>bold</b> & more]]></description>"));
        assert!(xml.contains(
            "<description><![CDATA[before ]]]]><![CDATA[> after]]></description>"
        ));
        let feed = parse(&xml);
        assert_eq!(
            feed.entries[0].summary.as_ref().unwrap().content,
            "<b>bold</b> & more"
        );
    }

    #[test]
    fn test_channel_envelope() {
        let xml = render_feed(&channel(), &[], build_time()).unwrap();

        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(r#"<itunes:category text="Games &amp; Hobbies">"#));
        assert!(xml.contains(r#"<itunes:category text="Video Games"/>"#));
        assert!(xml.contains("<itunes:explicit>false</itunes:explicit>"));
        assert!(xml.contains("<itunes:email>gamecores@qq.com</itunes:email>"));
        assert!(xml.contains("<sy:updatePeriod>daily</sy:updatePeriod>"));
        assert!(xml.contains(&format!(
            "<lastBuildDate>{}</lastBuildDate>",
            build_time().to_rfc2822()
        )));

        let feed = parse(&xml);
        assert_eq!(feed.title.unwrap().content, "（非官方源）GADIO");
        assert!(feed.entries.is_empty());
    }

    #[test]
    fn test_control_characters_dropped() {
        let mut record = episode("bad\u{0}title", 10);
        record.summary = "bell\u{7}".to_string();
        let xml = render_feed(&channel(), &[record], build_time()).unwrap();
        assert!(xml.contains("<title>badtitle | Gadio Pro</title>"));
        assert_eq!(parse(&xml).entries[0].summary.as_ref().unwrap().content, "bell");
    }

    #[test]
    fn test_subtitle_first_line_capped() {
        assert_eq!(subtitle("\r\n  first line \r\nsecond"), "first line");
        assert_eq!(subtitle(""), "");
        assert_eq!(subtitle(&"长".repeat(300)).chars().count(), MAX_SUBTITLE_CHARS);
    }

    #[test]
    fn test_write_feed_creates_parents_and_replaces() {
        let dir = std::env::temp_dir().join("gadio_feed_writer_test");
        std::fs::remove_dir_all(&dir).ok();
        let path = dir.join("nested").join("feed.xml");

        write_feed(&path, "<rss/>").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<rss/>");

        write_feed(&path, "<rss></rss>").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<rss></rss>");

        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_write_feed_failure_cleans_up_temp_file() {
        let dir = std::env::temp_dir().join("gadio_feed_writer_fail_test");
        std::fs::remove_dir_all(&dir).ok();
        // A non-empty directory at the destination makes the rename fail
        let path = dir.join("feed.xml");
        std::fs::create_dir_all(path.join("occupied")).unwrap();

        assert!(write_feed(&path, "<rss/>").is_err());
        assert!(path.is_dir());

        let leftovers: Vec<_> = std::fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }
}
