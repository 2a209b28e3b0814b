use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use httptest::{matchers::request, responders::status_code, Expectation, Server};
use serde_json::{json, Value};
use tempfile::TempDir;
use zip::write::FileOptions;

struct Device {
    temp: TempDir,
    catalog: PathBuf,
}

impl Device {
    fn new(catalog: &Value) -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("storefront.json");
        fs::write(&path, serde_json::to_vec_pretty(catalog).expect("catalog json")).expect("write catalog");
        Self {
            temp,
            catalog: path,
        }
    }

    fn root(&self) -> &Path {
        self.temp.path()
    }

    fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("pakstore");
        cmd.env("PAKSTORE_SD_ROOT", self.root().join("sd"))
            .env("PAKSTORE_DATA_DIR", self.root().join("data"))
            .env("PAKSTORE_CACHE_DIR", self.root().join("cache"))
            .env("PAKSTORE_STOREFRONT_OVERRIDE", &self.catalog)
            .env("PAKSTORE_PLATFORM", "tg5040")
            .env("PAKSTORE_PROGRESS", "0")
            .env("NO_COLOR", "1");
        cmd
    }
}

fn parse_json(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("valid json")
}

fn catalog(repo_url: &str) -> Value {
    json!({
        "name": "Test Store",
        "paks": [
            {
                "id": "thing-id",
                "storefront_name": "Thing",
                "name": "Thing",
                "version": "1.0.0",
                "type": "TOOL",
                "description": "Does things",
                "repo_url": repo_url,
                "release_filename": "Thing.zip",
                "categories": ["Tools"],
                "changelog": { "1.0.0": "First release", "0.9.0": "Beta" }
            },
            {
                "id": "other-id",
                "storefront_name": "Other Device Only",
                "name": "Other",
                "version": "1.0.0",
                "type": "EMU",
                "categories": ["Emulators"],
                "platforms": ["tg5050"]
            }
        ]
    })
}

fn zip_bytes(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, contents) in entries {
        writer
            .start_file(*name, FileOptions::default())
            .expect("start file");
        writer.write_all(contents.as_bytes()).expect("write entry");
    }
    writer.finish().expect("finish zip").into_inner()
}

#[test]
fn browse_respects_platform_filter() {
    let device = Device::new(&catalog("https://github.com/example/thing"));

    let assert = device.cmd().args(["--json", "browse"]).assert().success();
    let payload = parse_json(&assert.get_output().stdout);
    assert_eq!(payload["status"], "Ok");
    assert_eq!(payload["details"]["categories"], json!({ "Tools": 1 }));

    let assert = device
        .cmd()
        .args(["--json", "--all-platforms", "browse"])
        .assert()
        .success();
    let payload = parse_json(&assert.get_output().stdout);
    assert_eq!(payload["details"]["categories"]["Emulators"], 1);

    device
        .cmd()
        .args(["browse", "Nope"])
        .assert()
        .code(1);
}

#[test]
fn install_then_uninstall_round_trip() {
    let server = Server::run();
    server.expect(
        Expectation::matching(request::method_path(
            "GET",
            "/example/thing/releases/download/1.0.0/Thing.zip",
        ))
        .respond_with(status_code(200).body(zip_bytes(&[("launch.sh", "#!/bin/sh\n")]))),
    );
    let device = Device::new(&catalog(&server.url_str("/example/thing")));

    device.cmd().args(["install", "Thing"]).assert().success();
    let installed = device.root().join("sd/Tools/tg5040/Thing.pak/launch.sh");
    assert_eq!(fs::read_to_string(&installed).expect("installed file"), "#!/bin/sh\n");

    device.cmd().args(["install", "Thing"]).assert().code(1);

    let assert = device
        .cmd()
        .args(["--json", "installed"])
        .assert()
        .success();
    let payload = parse_json(&assert.get_output().stdout);
    let entries = payload["details"]["installed"].as_array().expect("installed list");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["status"], "current");

    let assert = device.cmd().args(["--json", "info", "thing-id"]).assert().success();
    let payload = parse_json(&assert.get_output().stdout);
    assert_eq!(payload["details"]["changelog"][0]["version"], "1.0.0");
    assert_eq!(payload["details"]["has_update"], false);

    device.cmd().args(["uninstall", "Thing"]).assert().success();
    assert!(!installed.exists());
    device.cmd().args(["uninstall", "Pak Store"]).assert().code(1);
}

#[test]
fn config_set_is_persisted() {
    let device = Device::new(&catalog("https://github.com/example/thing"));

    device
        .cmd()
        .args(["config", "set", "platform-filter", "all"])
        .assert()
        .success();
    let saved = fs::read_to_string(device.root().join("data/config.json")).expect("config file");
    assert!(saved.contains("\"all\""));

    let assert = device.cmd().args(["--json", "config", "show"]).assert().success();
    let payload = parse_json(&assert.get_output().stdout);
    assert_eq!(payload["details"]["platform_filter"], "all");

    let assert = device.cmd().args(["--json", "browse"]).assert().success();
    let payload = parse_json(&assert.get_output().stdout);
    assert_eq!(payload["details"]["categories"]["Emulators"], 1);
}

#[test]
fn unknown_pak_and_broken_catalog_exit_codes() {
    let device = Device::new(&catalog("https://github.com/example/thing"));
    device.cmd().args(["info", "Missing"]).assert().code(1);
    device.cmd().args(["update", "Thing"]).assert().code(1);

    fs::write(&device.catalog, "{ not json").expect("corrupt catalog");
    let assert = device.cmd().args(["--json", "updates"]).assert().code(2);
    let payload = parse_json(&assert.get_output().stdout);
    assert_eq!(payload["status"], "Failure");
    assert_eq!(payload["details"]["error"], "parse");
}

#[test]
fn quiet_hides_success_but_reports_failures_on_stderr() {
    let device = Device::new(&catalog("https://github.com/example/thing"));

    let assert = device.cmd().args(["--quiet", "browse"]).assert().success();
    let output = assert.get_output();
    assert!(output.stdout.is_empty());
    assert!(!String::from_utf8_lossy(&output.stderr).contains("categories"));

    let assert = device.cmd().args(["-q", "info", "Missing"]).assert().code(1);
    let output = assert.get_output();
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Missing"));
}
