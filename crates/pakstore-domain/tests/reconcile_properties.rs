use std::cmp::Ordering;
use std::collections::BTreeSet;

use pakstore_domain::{
    compare, derive_state, find_record, Catalog, InstalledRecord, MatchRule, PlatformFilter,
    ReconcileOptions,
};
use serde_json::json;

fn catalog() -> Catalog {
    let manifest = json!({
        "name": "Storefront",
        "paks": [
            {
                "id": "alpha-id",
                "storefront_name": "Alpha",
                "name": "Alpha",
                "version": "1.2.0",
                "type": "TOOL",
                "repo_url": "https://github.com/example/alpha",
                "categories": ["Tools"]
            },
            {
                "id": "bravo-id",
                "storefront_name": "Bravo",
                "name": "Bravo",
                "version": "2.0",
                "type": "EMU",
                "repo_url": "https://github.com/example/bravo",
                "previous_repo_urls": ["https://github.com/someone/alpha"],
                "categories": ["Emulators", "Tools"]
            },
            {
                "id": "charlie-id",
                "storefront_name": "Charlie",
                "name": "Charlie",
                "version": "1.0.0",
                "type": "TOOL",
                "repo_url": "https://github.com/example/charlie",
                "categories": ["Tools"]
            },
            {
                "id": "delta-id",
                "storefront_name": "Delta",
                "name": "Delta",
                "version": "3.0.0",
                "type": "TOOL",
                "repo_url": "https://github.com/example/delta",
                "categories": ["Tools"],
                "disabled": true
            },
            {
                "id": "echo-id",
                "storefront_name": "Echo",
                "name": "Echo",
                "version": "1.0.0",
                "type": "TOOL",
                "categories": ["Tools"],
                "platforms": ["tg5050"]
            }
        ]
    });
    Catalog::from_json(&serde_json::to_vec(&manifest).expect("manifest json")).expect("catalog")
}

fn record(catalog: &Catalog, id: &str, version: &str) -> InstalledRecord {
    let pak = catalog.find_by_id(id).expect("pak in catalog");
    InstalledRecord {
        version: version.to_string(),
        ..InstalledRecord::from_pak(pak)
    }
}

fn options(filter: PlatformFilter) -> ReconcileOptions {
    ReconcileOptions {
        filter,
        platform: "tg5040".into(),
    }
}

#[test]
fn versions_ignore_prefix_and_trailing_zeros() {
    assert_eq!(compare("1.2.3", "1.2.4"), Ordering::Less);
    assert_eq!(compare("v2.0", "1.9.9"), Ordering::Greater);
    assert_eq!(compare("1.2", "1.2.0.0"), Ordering::Equal);
    assert_eq!(compare("v1.2", "1.2"), Ordering::Equal);
}

#[test]
fn identifier_match_beats_repository_match() {
    let catalog = catalog();
    let bravo = catalog.find_by_id("bravo-id").expect("bravo");
    let alpha = catalog.find_by_id("alpha-id").expect("alpha");
    // Carries alpha's identifier but a URL bravo lists as a former home.
    let mut legacy = record(&catalog, "alpha-id", "1.0.0");
    legacy.repo_url = Some("https://github.com/someone/alpha".into());

    assert_eq!(
        find_record(alpha, std::slice::from_ref(&legacy)),
        Some((0, MatchRule::Identifier))
    );
    let state = derive_state(&catalog, &[legacy], &options(PlatformFilter::MatchDevice));
    let updated: Vec<_> = state
        .updates_available
        .iter()
        .map(|update| update.pak.display_name.as_str())
        .collect();
    assert_eq!(updated, vec!["Alpha"]);
    assert!(state.browse_by_category["Emulators"].contains_key(&bravo.display_name));
}

#[test]
fn earlier_entry_without_identifier_cannot_take_an_identified_record() {
    let manifest = json!({
        "name": "Storefront",
        "paks": [
            {
                "storefront_name": "Legacy Fork",
                "name": "LegacyFork",
                "version": "1.0.0",
                "type": "TOOL",
                "repo_url": "https://github.com/example/shared",
                "categories": ["Tools"]
            },
            {
                "id": "alpha-id",
                "storefront_name": "Alpha",
                "name": "Alpha",
                "version": "1.0.0",
                "type": "TOOL",
                "repo_url": "https://github.com/example/alpha",
                "categories": ["Tools"]
            }
        ]
    });
    let catalog =
        Catalog::from_json(&serde_json::to_vec(&manifest).expect("manifest json")).expect("catalog");
    let installed = InstalledRecord {
        repo_url: Some("https://github.com/example/shared".into()),
        ..record(&catalog, "alpha-id", "1.0.0")
    };

    let state = derive_state(&catalog, &[installed], &options(PlatformFilter::All));
    let current = &state.up_to_date["pak_id:alpha-id"];
    assert_eq!(current.pak.display_name, "Alpha");
    assert_eq!(current.matched_by, MatchRule::Identifier);
    let browsed: Vec<_> = state.browse_by_category["Tools"].keys().map(String::as_str).collect();
    assert_eq!(browsed, vec!["Legacy Fork"]);
    assert!(state.orphaned.is_empty());
}

#[test]
fn reconciling_twice_gives_the_same_state() {
    let catalog = catalog();
    let records = vec![
        record(&catalog, "charlie-id", "1.0.0"),
        record(&catalog, "alpha-id", "1.0.0"),
    ];
    let reversed: Vec<_> = records.iter().rev().cloned().collect();
    let options = options(PlatformFilter::All);

    let first = derive_state(&catalog, &records, &options);
    let second = derive_state(&catalog, &records, &options);
    let reordered = derive_state(&catalog, &reversed, &options);
    assert_eq!(first, second);
    assert_eq!(first, reordered);
}

#[test]
fn disabled_paks_never_surface() {
    let catalog = catalog();
    let old_delta = record(&catalog, "delta-id", "1.0.0");

    for filter in [PlatformFilter::MatchDevice, PlatformFilter::All] {
        let empty = derive_state(&catalog, &[], &options(filter));
        assert!(empty
            .browse_by_category
            .values()
            .all(|paks| !paks.contains_key("Delta")));

        let installed = derive_state(&catalog, std::slice::from_ref(&old_delta), &options(filter));
        assert!(installed.updates_available.is_empty());
        assert_eq!(installed.orphaned.len(), 1);
    }
}

#[test]
fn installed_views_are_disjoint() {
    let catalog = catalog();
    let records = vec![
        record(&catalog, "alpha-id", "1.0.0"),
        record(&catalog, "bravo-id", "2.0.0"),
        record(&catalog, "charlie-id", "0.9"),
    ];
    let state = derive_state(&catalog, &records, &options(PlatformFilter::All));

    let pending: BTreeSet<_> = state
        .updates_available
        .iter()
        .map(|update| update.identity.as_str())
        .collect();
    let current: BTreeSet<_> = state.up_to_date.keys().map(String::as_str).collect();
    assert_eq!(pending, BTreeSet::from(["pak_id:alpha-id", "pak_id:charlie-id"]));
    assert_eq!(current, BTreeSet::from(["pak_id:bravo-id"]));
    assert!(pending.is_disjoint(&current));

    let browsed: BTreeSet<_> = state
        .browse_by_category
        .values()
        .flat_map(|paks| paks.keys().map(String::as_str))
        .collect();
    assert_eq!(browsed, BTreeSet::from(["Echo"]));
}
