//! Full runs against a mock POEditor server and an on-disk string store

use mockito::{Matcher, Server, ServerGuard};
use poesync::{
    CollectionCatalog, Driver, LocaleStatus, Orchestrator, PoEditorClient, SyncError,
    SyncOptions,
};
use poesync_tables::{TransUnit, init_collection, load_collection, write_xliff};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn export_ok(server: &ServerGuard, locale: &str) -> String {
    format!(
        r#"{{"response":{{"status":"success","code":"200","message":"OK"}},"result":{{"url":"{}/download/{locale}.xliff"}}}}"#,
        server.url()
    )
}

fn payload(locale: &str, entries: &[(&str, &str, &str)]) -> String {
    let units: Vec<TransUnit> = entries
        .iter()
        .map(|(key, source, target)| TransUnit {
            key: key.to_string(),
            source: Some(source.to_string()),
            target: Some(target.to_string()),
        })
        .collect();
    write_xliff("en", locale, &units).unwrap()
}

/// A `Strings` collection declaring en, fr with one stale entry each
fn scaffold_store(dir: &Path) {
    init_collection(dir, "Strings", &["en".to_string(), "fr".to_string()]).unwrap();
    let mut strings = load_collection(dir, "Strings").unwrap();
    strings.table_mut("en").unwrap().insert("stale", "Old");
    strings.table_mut("fr").unwrap().insert("stale", "Vieux");
    strings.commit().unwrap();
}

fn client(server: &ServerGuard) -> PoEditorClient {
    PoEditorClient::new("test-key".to_string())
        .unwrap()
        .with_base_url(&server.url())
}

fn run_once(server: &ServerGuard, store: &Path) -> poesync::SyncResult<poesync::SyncSummary> {
    let client = client(server);
    let catalog = CollectionCatalog::new(store.to_path_buf(), "Strings");
    let mut strings = load_collection(store, "Strings").unwrap();
    let orchestrator = Orchestrator::new(
        &client,
        &catalog,
        &mut strings,
        SyncOptions::new("7717").unwrap(),
    );
    Driver::new(orchestrator)?.run_polling(Duration::from_millis(5))
}

#[test]
fn test_quota_exceeded_scenario() {
    let mut server = Server::new();
    let store = TempDir::new().unwrap();
    scaffold_store(store.path());

    let en_export = server
        .mock("POST", "/projects/export")
        .match_body(Matcher::AllOf(vec![
            Matcher::UrlEncoded("api_token".into(), "test-key".into()),
            Matcher::UrlEncoded("id".into(), "7717".into()),
            Matcher::UrlEncoded("language".into(), "en".into()),
            Matcher::UrlEncoded("type".into(), "xliff_1_2".into()),
        ]))
        .with_header("content-type", "application/json")
        .with_body(export_ok(&server, "en"))
        .expect(2)
        .create();
    let fr_export = server
        .mock("POST", "/projects/export")
        .match_body(Matcher::UrlEncoded("language".into(), "fr".into()))
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"response":{"status":"fail","code":"4048","message":"quota exceeded"}}"#,
        )
        .expect(2)
        .create();
    let en_download = server
        .mock("GET", "/download/en.xliff")
        .with_body(payload(
            "en",
            &[("play", "Play", "Play now"), ("quit", "Quit", "Quit game")],
        ))
        .expect(2)
        .create();

    let first = run_once(&server, store.path()).unwrap();

    assert_eq!(first.succeeded(), 1);
    assert_eq!(first.failed(), 1);
    assert_eq!(first.locales[0].locale, "en");
    assert_eq!(
        first.locales[1].status,
        LocaleStatus::Failed {
            message: "quota exceeded".to_string()
        }
    );

    let strings = load_collection(store.path(), "Strings").unwrap();
    let en = strings.table("en").unwrap();
    assert_eq!(en.get("play"), Some("Play now"));
    assert_eq!(en.get("stale"), None);
    assert_eq!(strings.table("fr").unwrap().get("stale"), Some("Vieux"));

    let en_file = store.path().join("Strings").join("en.json");
    let fr_file = store.path().join("Strings").join("fr.json");
    let en_after_first = std::fs::read(&en_file).unwrap();
    let fr_after_first = std::fs::read(&fr_file).unwrap();

    let second = run_once(&server, store.path()).unwrap();

    assert_eq!(first, second);
    assert_eq!(std::fs::read(&en_file).unwrap(), en_after_first);
    assert_eq!(std::fs::read(&fr_file).unwrap(), fr_after_first);

    en_export.assert();
    fr_export.assert();
    en_download.assert();
}

#[test]
fn test_catalog_unavailable_sends_no_requests() {
    let mut server = Server::new();
    let store = TempDir::new().unwrap();
    let export = server.mock("POST", "/projects/export").expect(0).create();

    let client = client(&server);
    let catalog = CollectionCatalog::new(store.path().to_path_buf(), "Missing");
    let mut strings = poesync_tables::TableCollection::new("Missing");
    let orchestrator = Orchestrator::new(
        &client,
        &catalog,
        &mut strings,
        SyncOptions::new("7717").unwrap(),
    );

    let result = Driver::new(orchestrator)
        .unwrap()
        .run_polling(Duration::from_millis(5));

    assert!(matches!(result, Err(SyncError::Catalog(_))));
    export.assert();
}

#[test]
fn test_frames_mode_with_failed_download() {
    let mut server = Server::new();
    let store = TempDir::new().unwrap();
    scaffold_store(store.path());

    server
        .mock("POST", "/projects/export")
        .match_body(Matcher::UrlEncoded("language".into(), "en".into()))
        .with_body(export_ok(&server, "en"))
        .create();
    server
        .mock("POST", "/projects/export")
        .match_body(Matcher::UrlEncoded("language".into(), "fr".into()))
        .with_body(export_ok(&server, "fr"))
        .create();
    server
        .mock("GET", "/download/en.xliff")
        .with_body(payload("en", &[("play", "Play", "Play now")]))
        .create();
    server
        .mock("GET", "/download/fr.xliff")
        .with_status(500)
        .create();

    let client = client(&server);
    let catalog = CollectionCatalog::new(store.path().to_path_buf(), "Strings");
    let mut strings = load_collection(store.path(), "Strings").unwrap();
    let orchestrator = Orchestrator::new(
        &client,
        &catalog,
        &mut strings,
        SyncOptions::new("7717").unwrap(),
    );

    let mut frames = 0;
    let summary = Driver::new(orchestrator)
        .unwrap()
        .run_host_loop(|_| {
            frames += 1;
            std::thread::sleep(Duration::from_millis(1));
        })
        .unwrap();

    assert!(frames > 0);
    assert_eq!(summary.succeeded(), 1);
    assert!(summary.report("fr").unwrap().is_failure());
    assert_eq!(strings.table("fr").unwrap().get("stale"), Some("Vieux"));

    let on_disk = load_collection(store.path(), "Strings").unwrap();
    assert_eq!(on_disk.table("fr").unwrap().get("stale"), Some("Vieux"));
    assert_eq!(on_disk.table("en").unwrap().get("play"), Some("Play now"));
}
