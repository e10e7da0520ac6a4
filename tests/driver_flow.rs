mod common;

use common::{driver_package, open_app, zip_archive, LIBRARY};
use emuctl::drivers::download::download_and_install;
use emuctl::drivers::{DriverError, DriverLocation, InstallResult, DEFAULT_DRIVER_NAME};
use emuctl::prefs::keys;
use tempfile::TempDir;

fn location_of(app: &emuctl::App, label: &str) -> DriverLocation {
    app.registry
        .list_drivers()
        .into_iter()
        .find(|(_, meta)| meta.label == label)
        .map(|(location, _)| location)
        .unwrap_or_else(|| panic!("driver {} not installed", label))
}

#[test]
fn test_install_select_delete() {
    let temp = TempDir::new().unwrap();
    let app = open_app(&temp);

    let result = app.registry.install(driver_package("Turnip", "24.2").as_slice());
    assert_eq!(result, InstallResult::Success);

    let location = location_of(&app, "Turnip (24.2)");
    let drivers = app.registry.list_drivers();
    let meta = &drivers[&location];
    assert_eq!(meta.vendor.as_deref(), Some("Mesa"));
    assert_eq!(meta.library_name, LIBRARY);

    app.registry.select(&location).unwrap();
    assert_eq!(app.registry.selected(), "Turnip (24.2)");
    assert_eq!(app.prefs.string(keys::GPU_DRIVER_NAME, ""), LIBRARY);

    app.registry.delete(&location).unwrap();
    assert_eq!(app.registry.selected(), DEFAULT_DRIVER_NAME);
    assert_eq!(app.registry.list_drivers().len(), 1);
}

#[test]
fn test_delete_leaves_other_drivers() {
    let temp = TempDir::new().unwrap();
    let app = open_app(&temp);
    for name in ["Turnip", "Freedreno", "Panfrost"] {
        let result = app.registry.install(driver_package(name, "1").as_slice());
        assert_eq!(result, InstallResult::Success);
    }

    let freedreno = location_of(&app, "Freedreno (1)");
    app.registry.select(&freedreno).unwrap();
    app.registry.delete(&location_of(&app, "Turnip (1)")).unwrap();

    let mut labels: Vec<String> = app
        .registry
        .list_drivers()
        .into_values()
        .map(|meta| meta.label)
        .collect();
    labels.sort();
    assert_eq!(
        labels,
        vec![DEFAULT_DRIVER_NAME, "Freedreno (1)", "Panfrost (1)"]
    );
    assert_eq!(app.registry.selected(), "Freedreno (1)");
    assert_eq!(app.registry.selected_location(), freedreno);
}

#[test]
fn test_selection_survives_restart() {
    let temp = TempDir::new().unwrap();
    {
        let app = open_app(&temp);
        app.registry.install(driver_package("Freedreno", "1").as_slice());
        let location = location_of(&app, "Freedreno (1)");
        app.registry.select(&location).unwrap();
        app.shutdown().unwrap();
    }

    let app = open_app(&temp);
    assert_eq!(app.registry.restore_selection().unwrap(), "Freedreno (1)");
}

#[test]
fn test_rejected_driver_keeps_selection() {
    let temp = TempDir::new().unwrap();
    let app = open_app(&temp);

    app.registry.install(driver_package("Broken", "1").as_slice());
    let location = location_of(&app, "Broken (1)");
    // The engine refuses drivers whose library is gone
    std::fs::remove_file(location.dir().unwrap().join(LIBRARY)).unwrap();

    let err = app.registry.select(&location).unwrap_err();
    assert!(matches!(err, DriverError::LoadRejected { .. }));
    assert_eq!(app.registry.selected(), DEFAULT_DRIVER_NAME);
}

#[test]
fn test_install_failures() {
    let temp = TempDir::new().unwrap();
    let app = open_app(&temp);

    let no_meta = zip_archive(&[(LIBRARY, b"\x7fELF")]);
    assert_eq!(
        app.registry.install(no_meta.as_slice()),
        InstallResult::MissingMetadata
    );

    let future_api = zip_archive(&[
        (
            "meta.json",
            br#"{"name":"Future","libraryName":"vulkan.custom.so","minApi":99}"#,
        ),
        (LIBRARY, b"\x7fELF"),
    ]);
    assert_eq!(
        app.registry.install(future_api.as_slice()),
        InstallResult::Unsupported
    );

    let package = driver_package("Twice", "1");
    assert_eq!(app.registry.install(package.as_slice()), InstallResult::Success);
    assert_eq!(
        app.registry.install(package.as_slice()),
        InstallResult::AlreadyInstalled
    );
    assert_eq!(app.registry.list_drivers().len(), 2);
}

#[tokio::test]
async fn test_fetch_download_and_install() {
    let mut server = mockito::Server::new_async().await;
    let releases = format!(
        r#"[{{"tag_name":"v1","name":"Remote v1","assets":[{{"name":"remote.zip","browser_download_url":"{}/files/remote.zip","size":100}}]}}]"#,
        server.url()
    );
    let _api = server
        .mock("GET", "/repos/acme/drivers/releases")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(releases)
        .create_async()
        .await;
    let _file = server
        .mock("GET", "/files/remote.zip")
        .with_status(200)
        .with_body(driver_package("Remote", "1"))
        .create_async()
        .await;

    let temp = TempDir::new().unwrap();
    let mut app = open_app(&temp);
    app.config.drivers.github_api = server.url();

    let available = app
        .release_fetcher()
        .fetch_releases("https://github.com/acme/drivers", false)
        .await
        .unwrap();
    assert_eq!(available.len(), 1);

    let mut last = 0;
    let result = download_and_install(
        &app.registry,
        &app.http,
        &available[0].download_url,
        &available[0].name,
        |downloaded, _| {
            assert!(downloaded >= last);
            last = downloaded;
        },
    )
    .await
    .unwrap();

    assert_eq!(result, InstallResult::Success);
    assert!(last > 0);
    location_of(&app, "Remote (1)");
}
