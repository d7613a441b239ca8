use std::io::Cursor;

use chrono::{DateTime, Utc};
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use super::RenderError;

#[derive(Debug, Clone)]
pub struct XmltvChannel {
    pub id: String,
    pub name: String,
    pub lcn: i32,
}

#[derive(Debug, Clone)]
pub struct XmltvProgramme {
    pub channel_id: String,
    pub title: String,
    pub desc: Option<String>,
    pub categories: Vec<String>,
    /// XMLTV timestamps: `YYYYMMDDHHMMSS +0000`
    pub start: String,
    pub stop: String,
}

pub fn format_xmltv_datetime(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%d%H%M%S +0000").to_string()
}

/// Render the full guide document. The output carries no generation
/// timestamp, so the same plan always renders to the same bytes.
pub fn render(
    channels: &[XmltvChannel],
    programmes: &[XmltvProgramme],
) -> Result<String, RenderError> {
    let estimated = 256 + channels.len() * 200 + programmes.len() * 300;
    let mut writer = Writer::new(Cursor::new(Vec::with_capacity(estimated)));

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Text(BytesText::new("\n")))?;
    writer.write_event(Event::DocType(BytesText::from_escaped(
        "tv SYSTEM \"xmltv.dtd\"",
    )))?;
    writer.write_event(Event::Text(BytesText::new("\n")))?;

    let mut tv = BytesStart::new("tv");
    tv.push_attribute(("generator-info-name", "lanecast"));
    writer.write_event(Event::Start(tv))?;
    writer.write_event(Event::Text(BytesText::new("\n")))?;

    for channel in channels {
        write_channel(&mut writer, channel)?;
    }
    for programme in programmes {
        write_programme(&mut writer, programme)?;
    }

    writer.write_event(Event::End(BytesEnd::new("tv")))?;
    writer.write_event(Event::Text(BytesText::new("\n")))?;

    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}

fn write_text_element<W: std::io::Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: &str,
) -> std::io::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))
}

fn write_channel<W: std::io::Write>(
    writer: &mut Writer<W>,
    channel: &XmltvChannel,
) -> std::io::Result<()> {
    let mut start = BytesStart::new("channel");
    start.push_attribute(("id", channel.id.as_str()));
    writer.write_event(Event::Start(start))?;

    write_text_element(writer, "display-name", &channel.name)?;
    write_text_element(writer, "lcn", &channel.lcn.to_string())?;

    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::Text(BytesText::new("\n")))
}

fn write_programme<W: std::io::Write>(
    writer: &mut Writer<W>,
    programme: &XmltvProgramme,
) -> std::io::Result<()> {
    let mut start = BytesStart::new("programme");
    start.push_attribute(("start", programme.start.as_str()));
    start.push_attribute(("stop", programme.stop.as_str()));
    start.push_attribute(("channel", programme.channel_id.as_str()));
    writer.write_event(Event::Start(start))?;

    write_text_element(writer, "title", &programme.title)?;
    if let Some(desc) = &programme.desc {
        write_text_element(writer, "desc", desc)?;
    }
    for category in &programme.categories {
        write_text_element(writer, "category", category)?;
    }

    writer.write_event(Event::End(BytesEnd::new("programme")))?;
    writer.write_event(Event::Text(BytesText::new("\n")))
}
