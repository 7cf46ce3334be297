// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Lenient parsing of control-file style paragraphs.

Tools like `dpkg -s`, `apt-cache show`, and `[In]Release` files all emit
paragraphs of `Field: value` lines separated by blank lines. See
<https://www.debian.org/doc/debian-policy/ch-controlfields.html>.

Unlike a strict control file parser, malformed lines never produce an error:
lines that are neither a field nor a continuation are skipped.
*/

/// A field in a paragraph.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ControlField {
    name: String,
    value: String,
}

impl ControlField {
    /// Construct an instance from a field name and value.
    pub fn new(name: impl ToString, value: impl ToString) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    /// The name of this field.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The value of this field.
    ///
    /// Continuation lines are joined with `\n` and keep their leading whitespace.
    pub fn value_str(&self) -> &str {
        &self.value
    }

    /// Obtain an iterator of lines in the value, leading whitespace stripped.
    pub fn iter_lines(&self) -> impl Iterator<Item = &str> {
        self.value.lines().map(|x| x.trim_start())
    }
}

/// An ordered series of fields.
///
/// Field names are case insensitive on read and case preserving on set.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct ControlParagraph {
    fields: Vec<ControlField>,
}

impl ControlParagraph {
    /// Whether the paragraph has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Set a field, replacing any existing field with the same name.
    pub fn set_field(&mut self, field: ControlField) {
        self.fields
            .retain(|cf| !cf.name.eq_ignore_ascii_case(&field.name));
        self.fields.push(field);
    }

    /// Whether a named field is present.
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Iterate over fields in insertion order.
    pub fn iter_fields(&self) -> impl Iterator<Item = &ControlField> {
        self.fields.iter()
    }

    /// Obtain the field with a given name.
    pub fn field(&self, name: &str) -> Option<&ControlField> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Obtain the raw string value of the named field.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.field(name).map(|f| f.value_str())
    }

    /// Obtain the value of a field parsed as a [u64].
    ///
    /// Values that aren't integers are treated as absent.
    pub fn field_u64(&self, name: &str) -> Option<u64> {
        self.field_str(name).and_then(|v| v.trim().parse::<u64>().ok())
    }
}

/// Holds parsing state, fed one line at a time.
#[derive(Clone, Debug, Default)]
pub struct ControlFileParser {
    paragraph: ControlParagraph,
    field: Option<(String, String)>,
}

impl ControlFileParser {
    /// Write a line to the parser.
    ///
    /// If the line terminates an in-progress paragraph, that paragraph is returned.
    pub fn write_line(&mut self, line: &str) -> Option<ControlParagraph> {
        let line = line.trim_end_matches(['\r', '\n']);

        if line.trim().is_empty() {
            self.flush_field();

            return if self.paragraph.is_empty() {
                None
            } else {
                Some(std::mem::take(&mut self.paragraph))
            };
        }

        let is_continuation = line.starts_with(' ') || line.starts_with('\t');

        if is_continuation {
            if let Some((_, value)) = &mut self.field {
                if !value.is_empty() {
                    value.push('\n');
                }
                value.push_str(line);
            }
            // A continuation without a field to continue is junk.
            return None;
        }

        self.flush_field();

        match line.split_once(':') {
            Some((name, value)) if !name.is_empty() && !name.contains(char::is_whitespace) => {
                self.field = Some((name.to_string(), value.trim().to_string()));
            }
            _ => {}
        }

        None
    }

    /// Finish parsing, returning any paragraph still being assembled.
    pub fn finish(mut self) -> Option<ControlParagraph> {
        self.flush_field();

        if self.paragraph.is_empty() {
            None
        } else {
            Some(self.paragraph)
        }
    }

    fn flush_field(&mut self) {
        if let Some((name, value)) = self.field.take() {
            self.paragraph.set_field(ControlField { name, value });
        }
    }
}

/// An ordered series of paragraphs.
#[derive(Clone, Debug, Default)]
pub struct ControlFile {
    paragraphs: Vec<ControlParagraph>,
}

impl ControlFile {
    /// Parse paragraphs from a string.
    pub fn parse_str(s: &str) -> Self {
        let mut paragraphs = Vec::new();
        let mut parser = ControlFileParser::default();

        for line in s.lines() {
            if let Some(paragraph) = parser.write_line(line) {
                paragraphs.push(paragraph);
            }
        }

        if let Some(paragraph) = parser.finish() {
            paragraphs.push(paragraph);
        }

        Self { paragraphs }
    }

    /// Obtain paragraphs in this control file.
    pub fn paragraphs(&self) -> impl Iterator<Item = &ControlParagraph> {
        self.paragraphs.iter()
    }

    /// Obtain paragraphs in this control file, consuming self.
    pub fn into_paragraphs(self) -> impl Iterator<Item = ControlParagraph> {
        self.paragraphs.into_iter()
    }
}
