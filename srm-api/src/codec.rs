//! XML document codec
//!
//! Maps between the exchange document and record field-sets:
//!
//! ```xml
//! <students>
//!   <student>
//!     <nom>Dupont</nom>
//!     <prenom>Marie</prenom>   <!-- optional -->
//!     <filiere>CS</filiere>
//!     <age>21</age>            <!-- optional -->
//!     <email>marie@example.com</email>
//!   </student>
//! </students>
//! ```
//!
//! Tag names are the external contract. The codec is pure: it never touches
//! the store.
//!
//! Decoding checks element *presence* only. A present but empty `<filiere/>`
//! decodes to an empty string and is left for store validation to reject.

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

use crate::models::{StudentFields, StudentRecord};

const ROOT: &str = "students";
const ELEMENT: &str = "student";

/// Document could not be turned into field-sets
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("document is not valid UTF-8: {0}")]
    Encoding(String),

    #[error("malformed XML: {0}")]
    Syntax(String),

    #[error("unexpected root element <{found}>, expected <students>")]
    UnexpectedRoot { found: String },

    /// `position` is 1-based in document order
    #[error("student #{position}: missing required element <{element}>")]
    MissingElement {
        position: usize,
        element: &'static str,
    },

    #[error("student #{position}: <age> value '{value}' is not an integer")]
    InvalidAge { position: usize, value: String },
}

/// Document could not be written
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("XML write error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn syntax(err: quick_xml::Error) -> DecodeError {
    DecodeError::Syntax(err.to_string())
}

fn tag_name(start: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(start.name().as_ref()).into_owned()
}

/// One `<student>` element as read, before required-field checks
#[derive(Debug, Default)]
struct StudentElement {
    nom: Option<String>,
    prenom: Option<String>,
    filiere: Option<String>,
    age: Option<String>,
    email: Option<String>,
}

impl StudentElement {
    /// First occurrence of a field wins; unknown children are ignored
    fn set(&mut self, name: &str, value: String) {
        let slot = match name {
            "nom" => &mut self.nom,
            "prenom" => &mut self.prenom,
            "filiere" => &mut self.filiere,
            "age" => &mut self.age,
            "email" => &mut self.email,
            _ => return,
        };
        if slot.is_none() {
            *slot = Some(value);
        }
    }

    fn into_fields(self, position: usize) -> Result<StudentFields, DecodeError> {
        let required = |value: Option<String>, element: &'static str| {
            value.ok_or(DecodeError::MissingElement { position, element })
        };

        let age = match self.age.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(text) => Some(text.parse::<i64>().map_err(|_| DecodeError::InvalidAge {
                position,
                value: text.to_string(),
            })?),
        };

        Ok(StudentFields {
            nom: required(self.nom, "nom")?,
            prenom: self.prenom.unwrap_or_default(),
            filiere: required(self.filiere, "filiere")?,
            age,
            email: required(self.email, "email")?,
        })
    }
}

/// Parse a document into field-sets in document order
pub fn decode(bytes: &[u8]) -> Result<Vec<StudentFields>, DecodeError> {
    let text = std::str::from_utf8(bytes).map_err(|e| DecodeError::Encoding(e.to_string()))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = Reader::from_str(text);

    // Skip prolog (declaration, comments, whitespace) up to the root element
    loop {
        match reader.read_event().map_err(syntax)? {
            Event::Start(e) => {
                check_root(&e)?;
                break;
            }
            Event::Empty(e) => {
                check_root(&e)?;
                return Ok(Vec::new());
            }
            Event::Eof => return Err(DecodeError::Syntax("document has no root element".to_string())),
            _ => {}
        }
    }

    let mut students = Vec::new();
    loop {
        match reader.read_event().map_err(syntax)? {
            Event::Start(e) if e.name().as_ref() == ELEMENT.as_bytes() => {
                let position = students.len() + 1;
                let element = read_student(&mut reader)?;
                students.push(element.into_fields(position)?);
            }
            Event::Empty(e) if e.name().as_ref() == ELEMENT.as_bytes() => {
                let position = students.len() + 1;
                students.push(StudentElement::default().into_fields(position)?);
            }
            Event::Start(e) => skip_element(&mut reader, &e)?,
            Event::End(_) => break,
            Event::Eof => {
                return Err(DecodeError::Syntax(format!(
                    "unexpected end of document inside <{}>",
                    ROOT
                )))
            }
            _ => {}
        }
    }

    Ok(students)
}

fn check_root(start: &BytesStart<'_>) -> Result<(), DecodeError> {
    if start.name().as_ref() == ROOT.as_bytes() {
        Ok(())
    } else {
        Err(DecodeError::UnexpectedRoot {
            found: tag_name(start),
        })
    }
}

fn read_student(reader: &mut Reader<&[u8]>) -> Result<StudentElement, DecodeError> {
    let mut element = StudentElement::default();
    loop {
        match reader.read_event().map_err(syntax)? {
            Event::Start(e) => {
                let name = tag_name(&e);
                let value = read_text(reader)?;
                element.set(&name, value);
            }
            Event::Empty(e) => element.set(&tag_name(&e), String::new()),
            Event::End(_) => return Ok(element),
            Event::Eof => {
                return Err(DecodeError::Syntax(format!(
                    "unexpected end of document inside <{}>",
                    ELEMENT
                )))
            }
            _ => {}
        }
    }
}

/// Collect the text content of the current element up to its end tag
///
/// Nested markup inside a field is skipped.
fn read_text(reader: &mut Reader<&[u8]>) -> Result<String, DecodeError> {
    let mut text = String::new();
    loop {
        match reader.read_event().map_err(syntax)? {
            Event::Text(t) => text.push_str(&t.unescape().map_err(syntax)?),
            Event::CData(c) => {
                let raw = c.into_inner();
                text.push_str(
                    std::str::from_utf8(&raw).map_err(|e| DecodeError::Encoding(e.to_string()))?,
                );
            }
            Event::Start(e) => skip_element(reader, &e)?,
            Event::End(_) => return Ok(text.trim().to_string()),
            Event::Eof => {
                return Err(DecodeError::Syntax(
                    "unexpected end of document inside field".to_string(),
                ))
            }
            _ => {}
        }
    }
}

fn skip_element(reader: &mut Reader<&[u8]>, start: &BytesStart<'_>) -> Result<(), DecodeError> {
    let end = start.to_end().into_owned();
    reader.read_to_end(end.name()).map_err(syntax)?;
    Ok(())
}

/// Write records as a document, one `<student>` per record in the given order
///
/// Field order is `nom, prenom, filiere, age, email`. An empty `prenom` is
/// written as an empty element; an absent `age` is omitted.
pub fn encode(records: &[StudentRecord]) -> Result<Vec<u8>, EncodeError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;

    if records.is_empty() {
        writer.write_event(Event::Empty(BytesStart::new(ROOT)))?;
        return Ok(writer.into_inner());
    }

    writer.write_event(Event::Start(BytesStart::new(ROOT)))?;
    for record in records {
        writer.write_event(Event::Start(BytesStart::new(ELEMENT)))?;
        write_field(&mut writer, "nom", &record.nom)?;
        write_field(&mut writer, "prenom", &record.prenom)?;
        write_field(&mut writer, "filiere", &record.filiere)?;
        if let Some(age) = record.age {
            write_field(&mut writer, "age", &age.to_string())?;
        }
        write_field(&mut writer, "email", &record.email)?;
        writer.write_event(Event::End(BytesEnd::new(ELEMENT)))?;
    }
    writer.write_event(Event::End(BytesEnd::new(ROOT)))?;

    Ok(writer.into_inner())
}

fn write_field(writer: &mut Writer<Vec<u8>>, name: &str, value: &str) -> Result<(), EncodeError> {
    if value.is_empty() {
        writer.write_event(Event::Empty(BytesStart::new(name)))?;
    } else {
        writer.write_event(Event::Start(BytesStart::new(name)))?;
        writer.write_event(Event::Text(BytesText::new(value)))?;
        writer.write_event(Event::End(BytesEnd::new(name)))?;
    }
    Ok(())
}
