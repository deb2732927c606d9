// Scanner pipeline tests

use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use super::*;
use crate::catalog::merge;
use crate::ratelimit::{RateLimiter, SystemClock};

fn write_file(root: &Path, rel: &str, contents: &[u8]) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, contents).unwrap();
}

fn generator(tmp: &TempDir) -> ThumbnailGenerator {
    ThumbnailGenerator::new(
        tmp.path().join(THUMBS_FOLDER),
        Arc::new(RateLimiter::new(Arc::new(SystemClock))),
    )
}

#[test]
fn test_nested_tree_classification() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("downloads");
    write_file(&root, "Nature/Landscapes/mountains/clip_4k.mp4", b"fake");

    let gen = generator(&tmp);
    let doc = Scanner::new(&root, &gen).scan_tree().unwrap();

    let entry = &doc.categories["Nature"]["Landscapes"];
    assert_eq!(entry.queries.len(), 1);
    let query = &entry.queries[0];
    assert_eq!(query.query, "mountains");
    assert_eq!(query.total_results, 1);

    let video = &query.videos[0];
    assert_eq!(video.resolution, "4K");
    assert_eq!(video.duration, "0:00");
    assert_eq!(video.title, "Clip 4k");
    assert!(!video.is_annotation);
}

#[test]
fn test_flat_tree_is_uncategorized() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("downloads");
    write_file(&root, "sunsets/a.mp4", b"fake");

    let gen = generator(&tmp);
    let doc = Scanner::new(&root, &gen).scan_tree().unwrap();

    let entry = &doc.categories[UNCATEGORIZED]["Sunsets"];
    assert_eq!(entry.queries.len(), 1);
    assert_eq!(entry.queries[0].query, "sunsets");
    assert_eq!(entry.queries[0].folder, "sunsets");
}

#[test]
fn test_direct_videos_override_nested_structure() {
    // A first-level folder with videos directly inside stays uncategorized
    // even though it also nests a full category layout below.
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("downloads");
    write_file(&root, "mixed/stray.mp4", b"fake");
    write_file(&root, "mixed/Landscapes/mountains/clip.mp4", b"fake");

    let gen = generator(&tmp);
    let doc = Scanner::new(&root, &gen).scan_tree().unwrap();

    assert!(doc.categories.contains_key(UNCATEGORIZED));
    assert!(!doc.categories.contains_key("mixed"));
    // Both videos land in the single uncategorized query
    let query = &doc.categories[UNCATEGORIZED]["Mixed"].queries[0];
    assert_eq!(query.total_results, 2);
}

#[test]
fn test_empty_folders_are_pruned() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("downloads");
    // Category/Subconcept/Query layout but no recognized video extensions
    write_file(&root, "Nature/Landscapes/mountains/readme.txt", b"no videos");
    std::fs::create_dir_all(root.join("Empty/Sub/query")).unwrap();

    let gen = generator(&tmp);
    let doc = Scanner::new(&root, &gen).scan_tree().unwrap();
    assert!(doc.is_empty());
}

#[test]
fn test_videos_sorted_by_title() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("downloads");
    write_file(&root, "clips/zebra_run.mp4", b"fake");
    write_file(&root, "clips/apple_fall.mp4", b"fake");
    write_file(&root, "clips/mid_walk.mp4", b"fake");

    let gen = generator(&tmp);
    let doc = Scanner::new(&root, &gen).scan_tree().unwrap();

    let titles: Vec<&str> = doc.categories[UNCATEGORIZED]["Clips"].queries[0]
        .videos
        .iter()
        .map(|v| v.title.as_str())
        .collect();
    assert_eq!(titles, vec!["Apple Fall", "Mid Walk", "Zebra Run"]);
}

#[test]
fn test_ids_stable_across_rescans() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("downloads");
    write_file(&root, "sunsets/a.mp4", b"fake");
    write_file(&root, "sunsets/b.mp4", b"fake");

    let gen = generator(&tmp);
    let scanner = Scanner::new(&root, &gen);
    let first = scanner.scan_tree().unwrap();
    let second = scanner.scan_tree().unwrap();

    let ids = |doc: &CatalogDocument| -> Vec<String> {
        doc.categories[UNCATEGORIZED]["Sunsets"].queries[0]
            .videos
            .iter()
            .map(|v| v.id.clone())
            .collect()
    };
    assert_eq!(ids(&first), ids(&second));

    // Ids are unique within the query
    let mut unique = ids(&first);
    unique.dedup();
    assert_eq!(unique.len(), 2);
}

#[test]
fn test_sidecar_external_id_wins() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("downloads");
    write_file(&root, "sunsets/sunset_beach.mp4", b"fake");
    write_file(
        &root,
        "sunsets/query_metadata.json",
        br#"{"video_file_mappings": {"123456789": {"filename": "sunset_beach.mp4"}}}"#,
    );

    let gen = generator(&tmp);
    let doc = Scanner::new(&root, &gen).scan_tree().unwrap();
    let video = &doc.categories[UNCATEGORIZED]["Sunsets"].queries[0].videos[0];
    assert_eq!(video.id, "123456789");
}

#[test]
fn test_malformed_sidecar_does_not_abort_scan() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("downloads");
    write_file(&root, "sunsets/a.mp4", b"fake");
    write_file(&root, "sunsets/query_metadata.json", b"{broken");

    let gen = generator(&tmp);
    let doc = Scanner::new(&root, &gen).scan_tree().unwrap();
    assert_eq!(doc.query_count(), 1);
}

#[test]
fn test_annotation_merge_scenario() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("downloads");
    write_file(
        &root,
        "Camera/Dolly/dolly.json",
        br#"{"results": [{"video": "https://x/adobe_stock_42.mp4", "score": 0.9, "question": "Is it dolly?"}]}"#,
    );

    let gen = generator(&tmp);
    let scanner = Scanner::new(&root, &gen);
    let doc = merge::combine(scanner.scan_tree().unwrap(), scanner.scan_annotations());

    let entry = &doc.categories["Camera"]["Dolly"];
    assert_eq!(entry.queries.len(), 1);
    let query = &entry.queries[0];
    assert!(query.is_annotation);

    let video = &query.videos[0];
    assert_eq!(video.score, Some(0.9));
    assert_eq!(video.question.as_deref(), Some("Is it dolly?"));
    assert!(video.is_annotation);
    assert_eq!(video.filename, "adobe_stock_42.mp4");
}

#[test]
fn test_annotation_videos_sorted_by_score_desc() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("downloads");
    write_file(
        &root,
        "Camera/Pan/pan.json",
        br#"{"results": [
            {"video": "local/low.mp4", "score": 0.2},
            {"video": "local/high.mp4", "score": 0.95},
            {"video": "local/mid.mp4", "score": 0.5}
        ]}"#,
    );

    let gen = generator(&tmp);
    let scanner = Scanner::new(&root, &gen);
    let placed = scanner.scan_annotations();
    assert_eq!(placed.len(), 1);

    let scores: Vec<f64> = placed[0]
        .record
        .videos
        .iter()
        .map(|v| v.score.unwrap())
        .collect();
    assert_eq!(scores, vec![0.95, 0.5, 0.2]);
}

#[test]
fn test_reserved_filenames_not_annotation_sources() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("downloads");
    // Both carry an annotation-like shape, but are reserved names
    let shaped = br#"{"results": [{"score": 0.9}]}"#;
    write_file(&root, "clips/ranking_results.json", shaped);
    write_file(&root, "clips/query_metadata.json", shaped);

    let gen = generator(&tmp);
    let scanner = Scanner::new(&root, &gen);
    assert!(scanner.scan_annotations().is_empty());
}

#[test]
fn test_collect_ranking_results() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("downloads");
    write_file(
        &root,
        "Camera Angle/Level Angle/level_angle/ranking_results.json",
        br#"{"results": [{"rank": 1}]}"#,
    );

    let gen = generator(&tmp);
    let results = Scanner::new(&root, &gen).collect_ranking_results();
    assert_eq!(results.len(), 1);
    assert!(results.contains_key("Camera Angle/Level Angle/level_angle"));
}

#[test]
fn test_tags_from_structure_and_filename() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("downloads");
    write_file(
        &root,
        "Nature/Landscapes/mountains/aerial/alpine_lake_4k_stock.mp4",
        b"fake",
    );

    let gen = generator(&tmp);
    let doc = Scanner::new(&root, &gen).scan_tree().unwrap();
    let video = &doc.categories["Nature"]["Landscapes"].queries[0].videos[0];

    // Query folder first, then the intermediate folder, then filename words;
    // "4k" is too short and "stock" is a stop word, both dropped.
    assert_eq!(video.tags, vec!["Mountains", "Aerial", "Alpine", "Lake"]);
}

#[test]
fn test_tags_deduplicate_and_cap() {
    let folder = Path::new("/downloads/sunsets");
    let tags = generate_tags(
        folder,
        Path::new("/downloads/sunsets/sunsets_one_two_three_four_five_six_seven_eight_nine.mp4"),
    );
    assert_eq!(tags.len(), crate::constants::MAX_VIDEO_TAGS);
    // The folder word and its filename duplicate collapse into one tag
    assert_eq!(tags[0], "Sunsets");
    assert_eq!(tags.iter().filter(|t| *t == "Sunsets").count(), 1);
}

#[test]
fn test_annotation_records_have_no_tags() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("downloads");
    write_file(
        &root,
        "Camera/Dolly/dolly.json",
        br#"{"results": [{"video": "https://x/adobe_stock_42.mp4", "score": 0.9}]}"#,
    );

    let gen = generator(&tmp);
    let placed = Scanner::new(&root, &gen).scan_annotations();
    assert!(placed[0].record.videos[0].tags.is_empty());
}

#[test]
fn test_annotation_filename_strips_url_extras() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("downloads");
    write_file(
        &root,
        "Camera/Pan/pan.json",
        br#"{"results": [{"video": "https://x/adobe_stock_42.mp4?token=abc123#t=2", "score": 0.7}]}"#,
    );

    let gen = generator(&tmp);
    let placed = Scanner::new(&root, &gen).scan_annotations();
    let video = &placed[0].record.videos[0];
    assert_eq!(video.filename, "adobe_stock_42.mp4");
    assert_eq!(video.title, "Adobe Stock 42");
    // The raw url, token included, is still what the record points at
    assert_eq!(video.url, "https://x/adobe_stock_42.mp4?token=abc123#t=2");
}

#[test]
fn test_title_from_stem() {
    assert_eq!(title_from_stem("sunset_beach-4k"), "Sunset Beach 4k");
    assert_eq!(title_from_stem("mountains"), "Mountains");
    assert_eq!(title_from_stem(""), "");
}
