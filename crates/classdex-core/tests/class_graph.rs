use classdex_core::{collect_implementations, format_index, merge_fragments, ClassHeader, HeaderIndex};
use classdex_test_fixtures::{ClassFileBuilder, ACC_ABSTRACT, ACC_INTERFACE, ACC_PUBLIC, FRAGMENT_DIR, OBJECT};
use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;

fn index_of(classes: &[Vec<u8>]) -> HeaderIndex {
    let mut index = HeaderIndex::new();
    for bytes in classes {
        let header = ClassHeader::parse(bytes).expect("fixture class parses");
        index.insert(header.internal_name.clone(), header);
    }
    index
}

#[test]
fn test_headers_from_bytes_resolve_across_layers() {
    let index = index_of(&[
        ClassFileBuilder::new("app/Service").extends(OBJECT).access(ACC_PUBLIC | ACC_ABSTRACT).padded().build(),
        ClassFileBuilder::new("app/HttpService").extends("app/Service").padded().build(),
        ClassFileBuilder::new("app/TlsService").extends("app/HttpService").build(),
        ClassFileBuilder::new("app/Plugin").extends(OBJECT).access(ACC_INTERFACE | ACC_ABSTRACT).build(),
        ClassFileBuilder::new("lib/External").extends("lib/Missing").build(),
        ClassFileBuilder::new(OBJECT).without_super().build(),
    ]);

    assert_eq!(index.len(), 6);
    assert_eq!(index.get(OBJECT).and_then(|h| h.super_name.clone()), None);

    let services = collect_implementations("app/Service", &index, None);
    assert_eq!(
        services.into_iter().collect::<Vec<_>>(),
        vec!["app/HttpService", "app/TlsService"]
    );

    let everything = collect_implementations(OBJECT, &index, None);
    assert!(everything.contains("app/HttpService"));
    assert!(!everything.contains("app/Plugin"));
    assert!(!everything.contains("lib/External"));
}

#[test]
fn test_fragment_round_trip_feeds_resolution() {
    let index = index_of(&[
        ClassFileBuilder::new("app/Service").extends(OBJECT).access(ACC_ABSTRACT).build(),
        ClassFileBuilder::new("app/Local").extends("app/Service").build(),
    ]);

    let allowed: BTreeSet<String> = ["app/Service".to_string()].into();
    let merge = merge_fragments(
        [(format!("{}services.properties", FRAGMENT_DIR), "app.Service=dep.Remote\n")],
        FRAGMENT_DIR,
        &allowed,
    );
    assert!(merge.matched_all(&allowed));

    let found = collect_implementations("app/Service", &index, merge.implementations.get("app/Service"));
    let mut results = IndexMap::new();
    results.insert("app/Service".to_string(), found);

    assert_eq!(format_index(&results), "app.Service=app.Local,dep.Remote\n");
}
