//! Compiled gettext catalogs (`.mo` files).

use std::collections::HashMap;

use crate::error::{I18nError, Result};

const MAGIC: u32 = 0x9504_12de;
const HEADER_LEN: usize = 28;

/// Separates a message context from its msgid in catalog keys.
const CONTEXT_SEPARATOR: char = '\u{4}';

#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    plural: Option<String>,
    forms: Vec<String>,
}

/// A translation catalog of one domain in one language.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    messages: HashMap<String, Entry>,
}

impl Catalog {
    /// An empty catalog. Every lookup falls back to the msgid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a GNU `.mo` file in either byte order.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let reader = MoReader::new(data)?;

        let revision = reader.u32_at(4)?;
        if revision >> 16 > 1 {
            return Err(I18nError::Malformed(format!(
                "unsupported revision {revision:#x}"
            )));
        }

        let count = reader.u32_at(8)? as usize;
        let originals = reader.u32_at(12)? as usize;
        let translations = reader.u32_at(16)? as usize;
        for (name, table) in [("originals", originals), ("translations", translations)] {
            let end = count.checked_mul(8).and_then(|len| len.checked_add(table));
            if end.is_none_or(|end| end > data.len()) {
                return Err(I18nError::Malformed(format!(
                    "{count} entries do not fit the {name} table at {table:#x}"
                )));
            }
        }

        let mut messages = HashMap::with_capacity(count);
        for index in 0..count {
            let original = reader.string(originals, index)?;
            let translation = reader.string(translations, index)?;

            let (msgid, plural) = match original.split_once('\0') {
                Some((singular, plural)) => (singular.to_string(), Some(plural.to_string())),
                None => (original.to_string(), None),
            };
            let forms = translation.split('\0').map(str::to_string).collect();
            messages.insert(msgid, Entry { plural, forms });
        }

        Ok(Self { messages })
    }

    /// Encode as a little-endian `.mo` file without a hash table.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode(false)
    }

    fn encode(&self, big_endian: bool) -> Vec<u8> {
        let put = |out: &mut Vec<u8>, value: usize| {
            let value = value as u32;
            if big_endian {
                out.extend_from_slice(&value.to_be_bytes());
            } else {
                out.extend_from_slice(&value.to_le_bytes());
            }
        };

        // Originals are sorted so readers may binary search them.
        let mut entries: Vec<(String, String)> = self
            .messages
            .iter()
            .map(|(msgid, entry)| {
                let original = match &entry.plural {
                    Some(plural) => format!("{msgid}\0{plural}"),
                    None => msgid.clone(),
                };
                (original, entry.forms.join("\0"))
            })
            .collect();
        entries.sort();

        let count = entries.len();
        let originals_at = HEADER_LEN;
        let translations_at = originals_at + 8 * count;
        let mut data_at = translations_at + 8 * count;

        let mut out = Vec::new();
        put(&mut out, MAGIC as usize);
        put(&mut out, 0);
        put(&mut out, count);
        put(&mut out, originals_at);
        put(&mut out, translations_at);
        put(&mut out, 0);
        put(&mut out, data_at);

        let mut strings = Vec::new();
        let mut tables = [Vec::new(), Vec::new()];
        for column in 0..2 {
            for (original, translation) in &entries {
                let text = if column == 0 { original } else { translation };
                put(&mut tables[column], text.len());
                put(&mut tables[column], data_at);
                strings.extend_from_slice(text.as_bytes());
                strings.push(0);
                data_at += text.len() + 1;
            }
        }

        out.extend_from_slice(&tables[0]);
        out.extend_from_slice(&tables[1]);
        out.extend_from_slice(&strings);
        out
    }

    pub fn insert(&mut self, msgid: impl Into<String>, translation: impl Into<String>) -> &mut Self {
        self.messages.insert(
            msgid.into(),
            Entry {
                plural: None,
                forms: vec![translation.into()],
            },
        );
        self
    }

    pub fn insert_plural(
        &mut self,
        singular: impl Into<String>,
        plural: impl Into<String>,
        forms: Vec<String>,
    ) -> &mut Self {
        self.messages.insert(
            singular.into(),
            Entry {
                plural: Some(plural.into()),
                forms,
            },
        );
        self
    }

    pub fn insert_with_context(
        &mut self,
        context: &str,
        msgid: &str,
        translation: impl Into<String>,
    ) -> &mut Self {
        self.insert(context_key(context, msgid), translation)
    }

    /// The translation of `msgid`, if the catalog has a non-empty one.
    pub fn translate(&self, msgid: &str) -> Option<&str> {
        self.form(msgid, 0)
    }

    /// The translation of `msgid`, or `msgid` itself when untranslated.
    pub fn gettext<'a>(&'a self, msgid: &'a str) -> &'a str {
        self.translate(msgid).unwrap_or(msgid)
    }

    /// Like [`gettext`](Self::gettext), for a msgid under `context`.
    pub fn pgettext<'a>(&'a self, context: &str, msgid: &'a str) -> &'a str {
        self.translate(&context_key(context, msgid))
            .unwrap_or(msgid)
    }

    /// Plural lookup with the two-form rule: form 0 for `n == 1`, form 1
    /// otherwise. Falls back to `singular` or `plural` when untranslated.
    pub fn ngettext<'a>(&'a self, singular: &'a str, plural: &'a str, n: u64) -> &'a str {
        let index = usize::from(n != 1);
        self.form(singular, index)
            .unwrap_or(if n == 1 { singular } else { plural })
    }

    /// A field of the catalog's metadata entry, e.g. `"Language"`.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.translate("")?.lines().find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim())
        })
    }

    /// Number of entries, the metadata entry included.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn form(&self, msgid: &str, index: usize) -> Option<&str> {
        self.messages
            .get(msgid)
            .and_then(|entry| entry.forms.get(index))
            .map(String::as_str)
            .filter(|text| !text.is_empty())
    }
}

fn context_key(context: &str, msgid: &str) -> String {
    format!("{context}{CONTEXT_SEPARATOR}{msgid}")
}

struct MoReader<'a> {
    data: &'a [u8],
    big_endian: bool,
}

impl<'a> MoReader<'a> {
    fn new(data: &'a [u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(I18nError::Malformed(format!(
                "{} bytes is too short for a catalog header",
                data.len()
            )));
        }

        let mut reader = Self {
            data,
            big_endian: false,
        };
        match reader.u32_at(0)? {
            MAGIC => {}
            magic if magic.swap_bytes() == MAGIC => reader.big_endian = true,
            magic => {
                return Err(I18nError::Malformed(format!(
                    "bad magic number {magic:#010x}"
                )));
            }
        }
        Ok(reader)
    }

    fn bytes(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or_else(|| {
                I18nError::Malformed(format!(
                    "range {offset}+{len} outside of {} bytes",
                    self.data.len()
                ))
            })
    }

    fn u32_at(&self, offset: usize) -> Result<u32> {
        let bytes = self.bytes(offset, 4)?;
        let word = [bytes[0], bytes[1], bytes[2], bytes[3]];
        Ok(if self.big_endian {
            u32::from_be_bytes(word)
        } else {
            u32::from_le_bytes(word)
        })
    }

    /// String `index` of the descriptor table at `table`.
    fn string(&self, table: usize, index: usize) -> Result<&'a str> {
        let descriptor = index
            .checked_mul(8)
            .and_then(|at| at.checked_add(table))
            .ok_or_else(|| I18nError::Malformed("string table overflow".to_string()))?;
        let len = self.u32_at(descriptor)? as usize;
        let offset = self.u32_at(descriptor + 4)? as usize;

        std::str::from_utf8(self.bytes(offset, len)?)
            .map_err(|err| I18nError::Malformed(format!("string {index} is not UTF-8: {err}")))
    }
}
