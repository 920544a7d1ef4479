//! EXIF extraction for upload enrichment.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{Local, NaiveDate, TimeZone};
use exif::{Exif, In, Rational, Tag, Value};

/// What the upload borrows from a file's EXIF block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExifSummary {
    /// Capture time as Unix seconds, read as local wall-clock time.
    pub captured_at: Option<i64>,
    /// Camera settings, e.g. `Canon EOS R f/2.8 1/250s 35mm ISO100`.
    pub description: String,
}

impl ExifSummary {
    pub fn is_empty(&self) -> bool {
        self.captured_at.is_none() && self.description.is_empty()
    }
}

/// Decode the EXIF summary of `path`.
///
/// Opens its own handle so a failure here never touches the upload body.
pub fn read_summary(path: &Path) -> Result<ExifSummary, exif::Error> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let exif = exif::Reader::new().read_from_container(&mut reader)?;
    Ok(summarize(&exif))
}

fn summarize(exif: &Exif) -> ExifSummary {
    let captured_at = exif
        .get_field(Tag::DateTimeOriginal, In::PRIMARY)
        .or_else(|| exif.get_field(Tag::DateTime, In::PRIMARY))
        .and_then(|field| match &field.value {
            Value::Ascii(parts) => parts.first().and_then(|raw| local_timestamp(raw)),
            _ => None,
        });

    let camera = [Tag::Make, Tag::Model]
        .into_iter()
        .filter_map(|tag| ascii(exif, tag))
        .collect::<Vec<_>>()
        .join(" ");

    let parts = [
        Some(camera).filter(|c| !c.is_empty()),
        first_rational(exif, Tag::FNumber).map(|r| format!("f/{}", decimal(r))),
        first_rational(exif, Tag::ExposureTime).map(exposure),
        first_rational(exif, Tag::FocalLength).map(|r| format!("{}mm", decimal(r))),
        first_uint(exif, Tag::PhotographicSensitivity).map(|iso| format!("ISO{iso}")),
    ];

    ExifSummary {
        captured_at,
        description: parts.into_iter().flatten().collect::<Vec<_>>().join(" "),
    }
}

/// `YYYY:MM:DD HH:MM:SS` in the camera's local time to Unix seconds.
fn local_timestamp(raw: &[u8]) -> Option<i64> {
    let dt = exif::DateTime::from_ascii(raw).ok()?;
    let naive = NaiveDate::from_ymd_opt(dt.year.into(), dt.month.into(), dt.day.into())?
        .and_hms_opt(dt.hour.into(), dt.minute.into(), dt.second.into())?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.timestamp())
}

fn ascii(exif: &Exif, tag: Tag) -> Option<String> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Ascii(parts) => {
            let text = String::from_utf8_lossy(parts.first()?);
            let text = text.trim_matches(char::from(0)).trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        _ => None,
    }
}

fn first_rational(exif: &Exif, tag: Tag) -> Option<Rational> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Rational(v) => v.first().copied().filter(|r| r.denom != 0),
        _ => None,
    }
}

fn first_uint(exif: &Exif, tag: Tag) -> Option<u32> {
    exif.get_field(tag, In::PRIMARY)?.value.get_uint(0)
}

fn decimal(r: Rational) -> String {
    let value = r.to_f64();
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{rounded:.1}")
    }
}

fn exposure(r: Rational) -> String {
    if r.num == 0 || r.num >= r.denom {
        format!("{}s", decimal(r))
    } else {
        format!("1/{}s", (r.denom as f64 / r.num as f64).round() as u64)
    }
}
