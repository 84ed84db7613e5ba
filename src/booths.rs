use std::collections::BTreeMap;

use serde_json::Value;

use crate::{
    error::Result,
    partition::PartitionHandle,
    query::FilterExpr,
    reconcile::{BOOTH_ID_FIELDS, BOOTH_NAME_FIELDS, BOOTH_NO_FIELDS, first_value},
    store::Document,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoothInfo {
    pub name: Option<String>,
    pub number: Option<String>,
}

/// Per-AC mapping from booth id to (name, number), aggregated from that
/// constituency's voters partition. First-seen wins per booth id; later
/// voter documents never amend an existing entry. Rebuilt fresh for every
/// migration run, never persisted.
pub type BoothLookup = BTreeMap<String, BoothInfo>;

pub fn build_booth_lookup(voters: &PartitionHandle) -> Result<BoothLookup> {
    let mut lookup = BoothLookup::new();
    voters.for_each(&FilterExpr::All, &mut |document| {
        let Some(booth_id) = field_as_string(&document, BOOTH_ID_FIELDS) else {
            return Ok(());
        };
        let info = BoothInfo {
            name: field_as_string(&document, BOOTH_NAME_FIELDS),
            number: field_as_string(&document, BOOTH_NO_FIELDS),
        };
        // An entry with neither name nor number carries no signal; keeping
        // it would shadow the free-text fallback for that booth id.
        if info.name.is_none() && info.number.is_none() {
            return Ok(());
        }
        lookup.entry(booth_id).or_insert(info);
        Ok(())
    })?;
    Ok(lookup)
}

/// Booth references of older vintages store numbers where strings are
/// expected; render either as the canonical string form.
fn field_as_string(document: &Document, candidates: &[&str]) -> Option<String> {
    match first_value(document, candidates)? {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}
