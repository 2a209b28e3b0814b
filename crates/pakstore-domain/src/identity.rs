//! Resolution between catalog entries and local installation records.
//!
//! Rules are tried in priority order and the first rule that finds a partner
//! wins, across all candidates: an identifier match on any candidate beats a
//! URL match on an earlier one.

use serde::Serialize;

use crate::model::{InstalledRecord, Pak};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    Identifier,
    RepoUrl,
    PreviousRepoUrl,
    DisplayName,
}

impl MatchRule {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            MatchRule::Identifier => "pak_id",
            MatchRule::RepoUrl => "repo_url",
            MatchRule::PreviousRepoUrl => "previous_repo_url",
            MatchRule::DisplayName => "display_name",
        }
    }
}

pub const ALL_RULES: [MatchRule; 4] = [
    MatchRule::Identifier,
    MatchRule::RepoUrl,
    MatchRule::PreviousRepoUrl,
    MatchRule::DisplayName,
];

/// Rules usable for records that have no identifier yet.
pub const LEGACY_RULES: [MatchRule; 3] = [
    MatchRule::RepoUrl,
    MatchRule::PreviousRepoUrl,
    MatchRule::DisplayName,
];

/// Whether `rule` pairs `pak` with `record`.
///
/// Two differing identifiers always mean two different paks, whatever the
/// URLs or names say. The name rule only applies to records that never had a
/// source URL recorded; a record with a URL is matched by URL or not at all.
#[must_use]
pub fn rule_matches(rule: MatchRule, pak: &Pak, record: &InstalledRecord) -> bool {
    if let (Some(pak_id), Some(record_id)) = (pak.identifier(), record.identifier()) {
        if pak_id != record_id {
            return false;
        }
    }

    match rule {
        MatchRule::Identifier => match (pak.identifier(), record.identifier()) {
            (Some(pak_id), Some(record_id)) => pak_id == record_id,
            _ => false,
        },
        MatchRule::RepoUrl => record
            .source_url()
            .is_some_and(|url| !pak.repo_url.is_empty() && url == pak.repo_url),
        MatchRule::PreviousRepoUrl => record
            .source_url()
            .is_some_and(|url| pak.previous_repo_urls.iter().any(|prev| prev == url)),
        MatchRule::DisplayName => {
            record.source_url().is_none()
                && (record.display_name == pak.display_name
                    || pak
                        .previous_names
                        .iter()
                        .any(|prev| prev == &record.display_name))
        }
    }
}

/// Catalog → installed direction: the index into `records` of the record
/// installed for `pak`, with the rule that matched.
#[must_use]
pub fn find_record(pak: &Pak, records: &[InstalledRecord]) -> Option<(usize, MatchRule)> {
    ALL_RULES.iter().find_map(|&rule| {
        records
            .iter()
            .position(|record| rule_matches(rule, pak, record))
            .map(|idx| (idx, rule))
    })
}

/// Pair every pak with at most one record, and every record with at most one
/// pak.
///
/// Assignment runs rule by rule over the whole list, so a record that one
/// pak matches by identifier is never taken by an earlier pak through a
/// weaker rule. Within a rule, earlier paks and earlier records win. The
/// result is parallel to `paks`.
#[must_use]
pub fn assign_records(
    paks: &[&Pak],
    records: &[InstalledRecord],
) -> Vec<Option<(usize, MatchRule)>> {
    let mut assigned = vec![None; paks.len()];
    let mut claimed = vec![false; records.len()];
    for rule in ALL_RULES {
        for (slot, pak) in assigned.iter_mut().zip(paks) {
            if slot.is_some() {
                continue;
            }
            let found = (0..records.len())
                .find(|&idx| !claimed[idx] && rule_matches(rule, pak, &records[idx]));
            if let Some(idx) = found {
                claimed[idx] = true;
                *slot = Some((idx, rule));
            }
        }
    }
    assigned
}

/// Installed → catalog direction, limited to `rules`.
#[must_use]
pub fn find_pak<'a>(
    record: &InstalledRecord,
    paks: &'a [Pak],
    rules: &[MatchRule],
) -> Option<(&'a Pak, MatchRule)> {
    rules.iter().find_map(|&rule| {
        paks.iter()
            .find(|pak| rule_matches(rule, pak, record))
            .map(|pak| (pak, rule))
    })
}
