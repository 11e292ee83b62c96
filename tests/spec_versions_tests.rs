mod common;

use common::{minimal_spec, write_spec};
use tempfile::TempDir;
use vervet::resource::API_VERSION_EXT;
use vervet::spec_versions::load_spec_versions;
use vervet::version::Version;
use vervet::Error;

fn v(s: &str) -> Version {
    s.parse().unwrap()
}

fn two_resource_fixture() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write_spec(
        root,
        "hello-world",
        "2021-06-01",
        &minimal_spec("Hello World", "/examples/hello-world", "helloWorldList", None),
    );
    write_spec(
        root,
        "hello-world",
        "2021-06-07",
        &minimal_spec("Hello World", "/examples/hello-world", "helloWorldList", None),
    );
    write_spec(
        root,
        "projects",
        "2021-06-04",
        &minimal_spec("Projects", "/orgs/{org_id}/projects", "listProjects", Some("experimental")),
    );
    tmp
}

#[test]
fn test_versions_are_the_union() {
    let tmp = two_resource_fixture();
    let specs = load_spec_versions(tmp.path()).unwrap();
    assert_eq!(
        specs.versions(),
        vec![
            v("2021-06-01"),
            v("2021-06-04~experimental"),
            v("2021-06-07"),
        ]
    );
}

#[test]
fn test_at_merges_matching_resources() {
    let tmp = two_resource_fixture();
    let specs = load_spec_versions(tmp.path()).unwrap();

    // At an experimental query both resources are present.
    let doc = specs.at(&v("2021-07-01~experimental")).unwrap();
    let paths = doc["paths"].as_object().unwrap();
    assert!(paths.contains_key("/examples/hello-world"));
    assert!(paths.contains_key("/orgs/{org_id}/projects"));

    // Each operation carries the version actually selected per resource.
    assert_eq!(
        paths["/examples/hello-world"]["get"][API_VERSION_EXT],
        "2021-06-07"
    );
    assert_eq!(
        paths["/orgs/{org_id}/projects"]["get"][API_VERSION_EXT],
        "2021-06-04~experimental"
    );

    // A GA query only sees the GA resource.
    let doc = specs.at(&v("2021-07-01")).unwrap();
    let paths = doc["paths"].as_object().unwrap();
    assert!(paths.contains_key("/examples/hello-world"));
    assert!(!paths.contains_key("/orgs/{org_id}/projects"));
}

#[test]
fn test_at_no_matching_version() {
    let tmp = two_resource_fixture();
    let specs = load_spec_versions(tmp.path()).unwrap();
    let err = specs.at(&v("2021-05-01")).unwrap_err();
    assert!(err.is_no_matching_version());
}

#[test]
fn test_conflicting_resources_fail_naming_both() {
    let tmp = TempDir::new().unwrap();
    // Two resources contribute the same path with different operations at
    // the same version.
    write_spec(
        tmp.path(),
        "alpha",
        "2021-06-01",
        &minimal_spec("Alpha", "/foo", "alphaFoo", None),
    );
    write_spec(
        tmp.path(),
        "beta-resource",
        "2021-06-01",
        &minimal_spec("Beta", "/foo", "betaFoo", None),
    );
    let specs = load_spec_versions(tmp.path()).unwrap();
    let err = specs.at(&v("2021-06-01")).unwrap_err();
    match err {
        Error::Conflict { pointer, sources } => {
            assert!(pointer.starts_with("#/paths/~1foo"), "pointer {pointer}");
            assert!(sources.contains("alpha"), "sources {sources}");
            assert!(sources.contains("beta-resource"), "sources {sources}");
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn test_underscore_resources_are_skipped() {
    let tmp = two_resource_fixture();
    write_spec(
        tmp.path(),
        "_examples",
        "2021-06-01",
        &minimal_spec("Example", "/examples", "listExamples", None),
    );
    let specs = load_spec_versions(tmp.path()).unwrap();
    assert_eq!(specs.resources().len(), 2);
    let doc = specs.at(&v("2021-07-01")).unwrap();
    assert!(doc["paths"].get("/examples").is_none());
}
