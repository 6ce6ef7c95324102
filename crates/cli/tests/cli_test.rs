//! Basic CLI integration tests.

#![allow(deprecated)] // Command::cargo_bin deprecated for custom build-dir; still works for default

use std::io::Write;
use std::path::Path;

use assert_cmd::Command;
use pretty_assertions::assert_eq;

fn write_epub(path: &Path) {
    let file = std::fs::File::create(path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let opts = zip::write::SimpleFileOptions::default();
    let files = [
        ("mimetype", "application/epub+zip".to_string()),
        (
            "META-INF/container.xml",
            r#"<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container"><rootfiles><rootfile full-path="OEBPS/content.opf"/></rootfiles></container>"#.to_string(),
        ),
        (
            "OEBPS/content.opf",
            r#"<package xmlns="http://www.idpf.org/2007/opf" version="3.0">
<metadata xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>Sample Book</dc:title><dc:creator>Jo Author</dc:creator></metadata>
<manifest>
  <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
  <item id="c1" href="c1.xhtml" media-type="application/xhtml+xml"/>
  <item id="c2" href="c2.xhtml" media-type="application/xhtml+xml"/>
</manifest>
<spine><itemref idref="c1"/><itemref idref="c2"/></spine>
</package>"#
                .to_string(),
        ),
        (
            "OEBPS/nav.xhtml",
            r#"<html xmlns:epub="http://www.idpf.org/2007/ops"><body><nav epub:type="toc"><ol><li><a href="c1.xhtml">Chapter 1</a></li><li><a href="c2.xhtml">Chapter 2</a></li></ol></nav></body></html>"#.to_string(),
        ),
        (
            "OEBPS/c1.xhtml",
            r#"<html><body><h1>Opening</h1><p>First words. <a href="c2.xhtml">next</a></p></body></html>"#.to_string(),
        ),
        ("OEBPS/c2.xhtml", "<html><body><p>Second words.</p></body></html>".to_string()),
    ];
    for (name, content) in files {
        zip.start_file(name, opts).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

#[test]
fn help_prints_and_exits_success() {
    Command::cargo_bin("shelf")
        .unwrap()
        .arg("--help")
        .assert()
        .success();
}

#[test]
fn config_show_runs() {
    Command::cargo_bin("shelf")
        .unwrap()
        .args(["config", "show"])
        .assert()
        .success();
}

#[test]
fn config_show_json_valid() {
    let out = Command::cargo_bin("shelf")
        .unwrap()
        .args(["config", "show", "--json"])
        .assert()
        .success();
    let stdout = std::str::from_utf8(&out.get_output().stdout).unwrap();
    let v: serde_json::Value =
        serde_json::from_str(stdout).expect("config show --json should output valid JSON");
    assert!(v["ingest"]["parse_toc"].is_boolean());
}

#[test]
fn config_set_then_show() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("shelf")
        .unwrap()
        .env("XDG_CONFIG_HOME", dir.path())
        .args(["config", "set", "cache.capacity", "7"])
        .assert()
        .success();
    assert!(dir.path().join("shelf").join("config.toml").exists());

    let out = Command::cargo_bin("shelf")
        .unwrap()
        .env("XDG_CONFIG_HOME", dir.path())
        .args(["config", "show", "--json"])
        .assert()
        .success();
    let v: serde_json::Value = serde_json::from_slice(&out.get_output().stdout).unwrap();
    assert_eq!(v["cache"]["capacity"], 7);

    Command::cargo_bin("shelf")
        .unwrap()
        .env("XDG_CONFIG_HOME", dir.path())
        .args(["config", "set", "nope.key", "1"])
        .assert()
        .failure();
}

#[test]
fn ingest_nonexistent_file_fails() {
    let out = Command::cargo_bin("shelf")
        .unwrap()
        .args(["ingest", "/nonexistent/file.epub"])
        .assert()
        .failure();
    let stderr = std::str::from_utf8(&out.get_output().stderr).unwrap();
    assert!(stderr.contains("Error:"));
}

#[test]
fn ingest_non_zip_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("broken.epub");
    std::fs::write(&input, b"not a zip").unwrap();
    Command::cargo_bin("shelf")
        .unwrap()
        .args(["ingest", input.to_str().unwrap(), "--out", dir.path().to_str().unwrap()])
        .assert()
        .failure();
}

#[test]
fn ingest_writes_json_files() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sample.epub");
    write_epub(&input);
    let out_dir = dir.path().join("out");

    Command::cargo_bin("shelf")
        .unwrap()
        .args([
            "ingest",
            input.to_str().unwrap(),
            "--folder",
            "folder-1",
            "--out",
            out_dir.to_str().unwrap(),
            "--json",
        ])
        .assert()
        .success();

    let book: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out_dir.join("book.json")).unwrap()).unwrap();
    assert_eq!(book["title"], "Sample Book");
    assert_eq!(book["author"], "Jo Author");
    assert_eq!(book["folderId"], "folder-1");
    assert_eq!(book["totalChapters"], 2);

    let chapters: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out_dir.join("chapters.json")).unwrap()).unwrap();
    assert_eq!(chapters.as_array().unwrap().len(), 2);
    assert_eq!(chapters[0]["title"], "Opening");
    let id = book["id"].as_str().unwrap();
    assert!(chapters[0]["content"]
        .as_str()
        .unwrap()
        .contains(&format!("/reader/{id}/1")));

    let toc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out_dir.join("toc.json")).unwrap()).unwrap();
    assert_eq!(toc[1]["startIndex"], 1);
}

#[test]
fn toc_json_lists_groups() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sample.epub");
    write_epub(&input);

    let out = Command::cargo_bin("shelf")
        .unwrap()
        .args(["toc", input.to_str().unwrap(), "--json"])
        .assert()
        .success();
    let toc: serde_json::Value = serde_json::from_slice(&out.get_output().stdout).unwrap();
    let titles: Vec<_> = toc
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(titles, vec!["Chapter 1", "Chapter 2"]);
}

#[test]
fn info_reports_title() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sample.epub");
    write_epub(&input);

    let out = Command::cargo_bin("shelf")
        .unwrap()
        .args(["info", input.to_str().unwrap()])
        .assert()
        .success();
    let stdout = std::str::from_utf8(&out.get_output().stdout).unwrap();
    assert!(stdout.contains("Title: Sample Book"));
    assert!(stdout.contains("Cover: no"));
}
