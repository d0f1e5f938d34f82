//! SDMX URN helpers.
//!
//! Item URNs look like
//! `urn:sdmx:org.sdmx.infomodel.codelist.Code=IMF.STA:CL_BOP_INDICATOR(9.0.1).CAB`:
//! the agency sits between `=` and `:`, the maintainable id before the
//! parenthesised version, and the item id after `).`.

use serde::{Deserialize, Serialize};

/// Parsed reference to an item (code or concept) inside a maintainable artefact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeUrn {
    pub agency: String,
    /// Codelist or concept scheme id.
    pub maintainable_id: String,
    pub version: Option<String>,
    /// Item id; `None` when the URN names the maintainable itself.
    pub item_id: Option<String>,
}

impl CodeUrn {
    /// Parses an item or maintainable URN. Returns `None` for malformed input.
    pub fn parse(urn: &str) -> Option<Self> {
        let (_, reference) = urn.split_once('=')?;
        let (agency, rest) = reference.split_once(':')?;
        if agency.is_empty() || rest.is_empty() {
            return None;
        }

        let (maintainable_id, version, item_id) = match rest.find('(') {
            Some(open) => {
                let close = rest[open..].find(')')? + open;
                let version = &rest[open + 1..close];
                let tail = &rest[close + 1..];
                let item = tail.strip_prefix('.').filter(|item| !item.is_empty());
                (&rest[..open], Some(version.to_string()), item)
            }
            None => match rest.split_once('.') {
                Some((id, item)) => (id, None, Some(item).filter(|item| !item.is_empty())),
                None => (rest, None, None),
            },
        };

        if maintainable_id.is_empty() {
            return None;
        }

        Some(Self {
            agency: agency.to_string(),
            maintainable_id: maintainable_id.to_string(),
            version,
            item_id: item_id.map(str::to_string),
        })
    }

    pub fn codelist_id(&self) -> &str {
        &self.maintainable_id
    }

    pub fn code(&self) -> Option<&str> {
        self.item_id.as_deref()
    }
}

/// Hierarchy entries reference parents as `CODELIST___CODE`; keep only the code part.
pub fn clean_node_ref(reference: &str) -> &str {
    match reference.rsplit_once("___") {
        Some((_, code)) => code,
        None => reference,
    }
}
