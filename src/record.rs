//! Persisted descriptor records.
//!
//! The host stores an action as a flat key/value record with four keys:
//! `STRING_MAC`, `STRING_MSG`, `BOOL_CRLF` and `BOOL_HEX`. Records written by
//! older versions or edited by hand may lack keys; a missing key is logged and
//! falls back to its default rather than rejecting the record outright.

use crate::address::PLACEHOLDER_SENTINEL;
use crate::descriptor::{CommandDescriptor, DescriptorError, DEFAULT_SUMMARY_LENGTH};
use anyhow::{anyhow, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const KEY_MAC: &str = "STRING_MAC";
pub const KEY_MSG: &str = "STRING_MSG";
pub const KEY_CRLF: &str = "BOOL_CRLF";
pub const KEY_HEX: &str = "BOOL_HEX";

const DEFAULT_CRLF: bool = true;
const DEFAULT_HEX: bool = false;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptorRecord {
    #[serde(rename = "STRING_MAC", default, skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    #[serde(rename = "STRING_MSG", default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(rename = "BOOL_CRLF", default, skip_serializing_if = "Option::is_none")]
    pub crlf: Option<bool>,
    #[serde(rename = "BOOL_HEX", default, skip_serializing_if = "Option::is_none")]
    pub hex: Option<bool>,
}

impl DescriptorRecord {
    /// Build a complete record from operator input, or report why it is unusable.
    pub fn generate(mac: &str, msg: &str, crlf: bool, hex: bool) -> Result<Self, DescriptorError> {
        let record = DescriptorRecord {
            mac: Some(mac.to_string()),
            msg: Some(msg.to_string()),
            crlf: Some(crlf),
            hex: Some(hex),
        };
        record.descriptor()?;
        Ok(record)
    }

    pub fn mac(&self) -> Option<&str> {
        self.mac.as_deref()
    }

    pub fn msg(&self) -> Option<&str> {
        self.msg.as_deref()
    }

    /// Terminator flag; records without the key append CR/LF.
    pub fn crlf(&self) -> bool {
        self.crlf.unwrap_or(DEFAULT_CRLF)
    }

    pub fn hex(&self) -> bool {
        self.hex.unwrap_or(DEFAULT_HEX)
    }

    /// Keys absent from the stored record.
    pub fn missing_keys(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.crlf.is_none() {
            missing.push(KEY_CRLF);
        }
        if self.hex.is_none() {
            missing.push(KEY_HEX);
        }
        if self.mac.is_none() {
            missing.push(KEY_MAC);
        }
        if self.msg.is_none() {
            missing.push(KEY_MSG);
        }
        missing
    }

    /// Descriptor for the record's effective values.
    pub fn descriptor(&self) -> Result<CommandDescriptor, DescriptorError> {
        CommandDescriptor::try_create(self.mac(), self.msg(), self.crlf(), self.hex())
    }

    /// Full validity check as done before saving or firing.
    ///
    /// Missing keys are only warned about; the descriptor rules decide.
    pub fn is_valid(&self) -> bool {
        for key in self.missing_keys() {
            warn!("Record missing key {}", key);
        }
        match self.descriptor() {
            Ok(_) => true,
            Err(e) => {
                warn!("Rejecting record: {}", e);
                false
            }
        }
    }

    /// Summary line for a valid record.
    pub fn blurb(&self) -> Option<String> {
        self.blurb_with_length(DEFAULT_SUMMARY_LENGTH)
    }

    pub fn blurb_with_length(&self, max_length: usize) -> Option<String> {
        self.descriptor().ok().map(|d| d.summary(max_length))
    }

    /// Replace `%name` variables in the address and message.
    ///
    /// Names start with an ASCII letter followed by letters, digits or `_`.
    /// Unknown variables are left as written. Flags are never substituted.
    pub fn substitute(&self, vars: &HashMap<String, String>) -> Self {
        DescriptorRecord {
            mac: self.mac.as_deref().map(|s| replace_variables(s, vars)),
            msg: self.msg.as_deref().map(|s| replace_variables(s, vars)),
            crlf: self.crlf,
            hex: self.hex,
        }
    }

    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read record {}: {}", path.display(), e))?;
        let record: DescriptorRecord = serde_json::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse record {}: {}", path.display(), e))?;
        Ok(record)
    }

    pub async fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write record {}: {}", path.display(), e))?;
        Ok(())
    }
}

fn replace_variables(input: &str, vars: &HashMap<String, String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(pos) = rest.find(PLACEHOLDER_SENTINEL) {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + PLACEHOLDER_SENTINEL.len_utf8()..];
        let name_len = variable_name_len(after);
        match vars.get(&after[..name_len]) {
            Some(value) if name_len > 0 => out.push_str(value),
            _ => {
                out.push(PLACEHOLDER_SENTINEL);
                out.push_str(&after[..name_len]);
            }
        }
        rest = &after[name_len..];
    }
    out.push_str(rest);
    out
}

fn variable_name_len(s: &str) -> usize {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() => {}
        _ => return 0,
    }
    chars
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}
