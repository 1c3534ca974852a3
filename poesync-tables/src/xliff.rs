//! XLIFF 1.2 reader
//!
//! Reads the `<trans-unit>` elements of an XLIFF 1.2 document as exported by
//! POEditor (`type=xliff_1_2`):
//!
//! ```xml
//! <xliff version="1.2">
//!   <file source-language="en" target-language="fr" datatype="plaintext">
//!     <body>
//!       <trans-unit id="greeting" resname="greeting">
//!         <source>Hello</source>
//!         <target>Bonjour</target>
//!       </trans-unit>
//!     </body>
//!   </file>
//! </xliff>
//! ```
//!
//! The entry key is the `resname` attribute, falling back to `id`.

use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{TableError, TableResult};

/// One translation unit of an interchange file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransUnit {
    pub key: String,
    pub source: Option<String>,
    pub target: Option<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Source,
    Target,
}

/// Parse an XLIFF document into its translation units, in document order
pub fn parse_xliff(xml: &str) -> TableResult<Vec<TransUnit>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut units = Vec::new();
    let mut current: Option<TransUnit> = None;
    let mut field: Option<Field> = None;
    let mut saw_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"xliff" => saw_root = true,
                b"trans-unit" => current = Some(start_unit(&e)?),
                b"source" if current.is_some() => {
                    field = Some(Field::Source);
                    set_field(&mut current, Field::Source, String::new());
                }
                b"target" if current.is_some() => {
                    field = Some(Field::Target);
                    set_field(&mut current, Field::Target, String::new());
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"xliff" => saw_root = true,
                b"trans-unit" => units.push(start_unit(&e)?),
                b"source" if current.is_some() => {
                    set_field(&mut current, Field::Source, String::new())
                }
                b"target" if current.is_some() => {
                    set_field(&mut current, Field::Target, String::new())
                }
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if let Some(f) = field {
                    let text = e
                        .unescape()
                        .map_err(|err| TableError::Xliff(err.to_string()))?;
                    append_field(&mut current, f, &text);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(f) = field {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    append_field(&mut current, f, &text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"source" | b"target" => field = None,
                b"trans-unit" => {
                    if let Some(unit) = current.take() {
                        units.push(unit);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(TableError::Xliff(format!(
                    "at byte {}: {}",
                    reader.error_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    if !saw_root {
        return Err(TableError::Xliff("missing <xliff> root element".to_string()));
    }
    if current.is_some() {
        return Err(TableError::Xliff("unterminated <trans-unit>".to_string()));
    }

    Ok(units)
}

/// Read and parse an XLIFF file
pub fn read_xliff_file(path: &Path) -> TableResult<Vec<TransUnit>> {
    let content = std::fs::read_to_string(path).map_err(|e| TableError::io(path, e))?;
    parse_xliff(&content)
}

/// Serialize translation units as an XLIFF 1.2 document
pub fn write_xliff(
    source_language: &str,
    target_language: &str,
    units: &[TransUnit],
) -> TableResult<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    let mut emit = |event: Event<'_>| {
        writer
            .write_event(event)
            .map_err(|e| TableError::Xliff(e.to_string()))
    };

    emit(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    emit(Event::Start(BytesStart::new("xliff").with_attributes([
        ("version", "1.2"),
        ("xmlns", "urn:oasis:names:tc:xliff:document:1.2"),
    ])))?;
    emit(Event::Start(BytesStart::new("file").with_attributes([
        ("source-language", source_language),
        ("target-language", target_language),
        ("datatype", "plaintext"),
    ])))?;
    emit(Event::Start(BytesStart::new("body")))?;

    for unit in units {
        emit(Event::Start(BytesStart::new("trans-unit").with_attributes([
            ("id", unit.key.as_str()),
            ("resname", unit.key.as_str()),
        ])))?;
        for (name, value) in [("source", &unit.source), ("target", &unit.target)] {
            if let Some(value) = value {
                emit(Event::Start(BytesStart::new(name)))?;
                emit(Event::Text(BytesText::new(value)))?;
                emit(Event::End(BytesEnd::new(name)))?;
            }
        }
        emit(Event::End(BytesEnd::new("trans-unit")))?;
    }

    emit(Event::End(BytesEnd::new("body")))?;
    emit(Event::End(BytesEnd::new("file")))?;
    emit(Event::End(BytesEnd::new("xliff")))?;

    String::from_utf8(writer.into_inner()).map_err(|e| TableError::Xliff(e.to_string()))
}

fn start_unit(e: &BytesStart<'_>) -> TableResult<TransUnit> {
    let mut id = None;
    let mut resname = None;
    for attr in e.attributes() {
        let attr = attr.map_err(|err| TableError::Xliff(err.to_string()))?;
        let value = attr
            .unescape_value()
            .map_err(|err| TableError::Xliff(err.to_string()))?
            .into_owned();
        match attr.key.local_name().as_ref() {
            b"id" => id = Some(value),
            b"resname" => resname = Some(value),
            _ => {}
        }
    }

    let key = resname
        .filter(|r| !r.is_empty())
        .or(id)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| TableError::Xliff("<trans-unit> without id or resname".to_string()))?;

    Ok(TransUnit {
        key,
        source: None,
        target: None,
    })
}

fn set_field(unit: &mut Option<TransUnit>, field: Field, value: String) {
    if let Some(unit) = unit {
        match field {
            Field::Source => unit.source = Some(value),
            Field::Target => unit.target = Some(value),
        }
    }
}

fn append_field(unit: &mut Option<TransUnit>, field: Field, text: &str) {
    if let Some(unit) = unit {
        let slot = match field {
            Field::Source => &mut unit.source,
            Field::Target => &mut unit.target,
        };
        slot.get_or_insert_with(String::new).push_str(text);
    }
}
