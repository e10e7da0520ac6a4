//! Shared helpers for integration tests

#![allow(dead_code)]

use emuctl::bridge::ConsoleBridge;
use emuctl::config::AppConfig;
use emuctl::paths::AppPaths;
use emuctl::App;
use std::io::{Cursor, Write};
use std::sync::Arc;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

pub const LIBRARY: &str = "vulkan.custom.so";

/// Zip archive with the given entries
pub fn zip_archive(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Installable driver package named `name`
pub fn driver_package(name: &str, version: &str) -> Vec<u8> {
    let meta = format!(
        r#"{{"schemaVersion":1,"name":"{}","description":"Test driver","author":"tests","packageVersion":"{}","vendor":"Mesa","driverVersion":"Vulkan 1.3","minApi":28,"libraryName":"{}"}}"#,
        name, version, LIBRARY
    );
    zip_archive(&[("meta.json", meta.as_bytes()), (LIBRARY, b"\x7fELF driver")])
}

/// Application over a console bridge rooted in `temp`
pub fn open_app(temp: &TempDir) -> App {
    let paths = AppPaths::from_base(temp.path(), true);
    let bridge = ConsoleBridge::open(&paths.settings_document, &paths.keys_dir, true).unwrap();
    App::with_bridge(paths, AppConfig::default(), Arc::new(bridge)).unwrap()
}
