//! End-to-end merges over synthesized presentations.

mod common;

use common::{entry_names, entry_set, parts_in, read_entry, FixtureDeck};
use deck_core::{Compression, Error, MergeOptions, MergeReport, MergeWarning, SlideRequest};
use deck_pptx::content_types::ContentTypes;
use deck_pptx::partname::{rels_owner, rels_path, resolve_target};
use deck_pptx::rels::Relationships;
use deck_pptx::{merge_slides, DeckMerger, PptxParser};
use regex::Regex;
use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::{CompressionMethod, ZipArchive};

const CT_SLIDE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";

/// A workspace with two decks: A (three plain slides) and B (a plain slide
/// and an image slide, on their own master).
struct Workspace {
    dir: TempDir,
    a: PathBuf,
    b: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.pptx");
        let b = dir.path().join("b.pptx");
        FixtureDeck::new().slide("A1").slide("A2").slide("A3").write(&a);
        FixtureDeck::new().slide("B1").slide_with_image("B2").write(&b);
        Self { dir, a, b }
    }

    fn deck(&self, name: &str, deck: FixtureDeck) -> PathBuf {
        let path = self.dir.path().join(name);
        deck.write(&path);
        path
    }

    fn output(&self) -> PathBuf {
        self.dir.path().join("out").join("merged.pptx")
    }

    fn scratch(&self) -> PathBuf {
        self.dir.path().join("scratch")
    }

    fn options(&self) -> MergeOptions {
        MergeOptions::new().with_scratch_dir(self.scratch())
    }

    fn merge(&self, requests: &[(&Path, usize)]) -> MergeReport {
        self.merge_with(requests, self.options())
    }

    fn merge_with(&self, requests: &[(&Path, usize)], options: MergeOptions) -> MergeReport {
        let requests: Vec<SlideRequest> = requests
            .iter()
            .map(|(path, index)| SlideRequest::new(*path, *index))
            .collect();
        merge_slides(&requests, &self.output(), &options).unwrap()
    }

    fn scratch_is_empty(&self) -> bool {
        match fs::read_dir(self.scratch()) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        }
    }
}

fn titles(path: &Path) -> Vec<Option<String>> {
    PptxParser::new()
        .parse_file(path)
        .unwrap()
        .slides
        .into_iter()
        .map(|s| s.title)
        .collect()
}

fn ids(xml: &str, element: &str) -> Vec<u32> {
    let re = Regex::new(&format!(r#"<p:{} id="(\d+)""#, element)).unwrap();
    re.captures_iter(xml).map(|c| c[1].parse().unwrap()).collect()
}

fn template_parts(path: &Path) -> Vec<String> {
    ["ppt/slideLayouts", "ppt/slideMasters", "ppt/theme", "ppt/media"]
        .iter()
        .flat_map(|folder| parts_in(path, folder))
        .collect()
}

#[test]
fn test_single_slide_keeps_title() {
    let ws = Workspace::new();
    let single = ws.deck("single.pptx", FixtureDeck::new().slide("Amazing Grace"));

    let report = ws.merge(&[(&single, 1)]);

    assert_eq!(report.slides_written, 1);
    assert!(report.warnings.is_empty());
    assert_eq!(titles(&ws.output()), vec![Some("Amazing Grace".to_string())]);
}

#[test]
fn test_request_order_is_preserved() {
    let ws = Workspace::new();
    let report = ws.merge(&[(&ws.a, 2), (&ws.b, 1), (&ws.a, 1)]);

    assert_eq!(report.slides_written, 3);
    assert_eq!(report.masters_registered, 1);
    assert_eq!(
        titles(&ws.output()),
        vec![
            Some("A2".to_string()),
            Some("B1".to_string()),
            Some("A1".to_string())
        ]
    );
}

#[test]
fn test_repeated_request_imports_templates_once() {
    let ws = Workspace::new();
    let once = ws.merge(&[(&ws.a, 1), (&ws.b, 2)]);
    let once_templates = template_parts(&ws.output());

    let twice = ws.merge(&[(&ws.a, 1), (&ws.b, 2), (&ws.b, 2)]);
    let twice_templates = template_parts(&ws.output());

    assert_eq!(once.parts_imported, twice.parts_imported);
    assert_eq!(once_templates, twice_templates);
    assert_eq!(parts_in(&ws.output(), "ppt/media").len(), 1);
    assert_eq!(
        titles(&ws.output()),
        vec![
            Some("A1".to_string()),
            Some("B2".to_string()),
            Some("B2".to_string())
        ]
    );
}

#[test]
fn test_repeated_slide_is_a_separate_part_without_notes() {
    let ws = Workspace::new();
    let noted = ws.deck("noted.pptx", FixtureDeck::new().slide("N1").with_notes());

    ws.merge(&[(&noted, 1), (&noted, 1)]);

    let summary = PptxParser::new().parse_file(&ws.output()).unwrap();
    assert_eq!(summary.slides.len(), 2);
    let first = &summary.slides[0].part;
    let second = &summary.slides[1].part;
    assert_ne!(first, second);

    let rels = Relationships::parse(&read_entry(&ws.output(), &rels_path(second))).unwrap();
    assert!(rels.first_of_kind("notesSlide").is_none());
    assert!(rels.first_of_kind("slideLayout").is_some());

    let types = ContentTypes::parse(&read_entry(&ws.output(), "[Content_Types].xml")).unwrap();
    assert_eq!(types.lookup(second), Some(CT_SLIDE));
}

#[test]
fn test_invalid_indices_are_skipped() {
    let ws = Workspace::new();
    let report = ws.merge(&[(&ws.a, 0), (&ws.b, 1), (&ws.a, 9)]);

    assert_eq!(report.slides_requested, 3);
    assert_eq!(report.slides_written, 1);
    assert_eq!(report.slides_skipped(), 2);
    let skipped: Vec<usize> = report
        .warnings
        .iter()
        .filter_map(|w| match w {
            MergeWarning::SlideResolution { index, .. } => Some(*index),
            _ => None,
        })
        .collect();
    assert_eq!(skipped, vec![0, 9]);
    assert_eq!(titles(&ws.output()), vec![Some("B1".to_string())]);
}

#[test]
fn test_empty_request_is_configuration_error() {
    let ws = Workspace::new();
    let err = merge_slides(&[], &ws.output(), &ws.options()).unwrap_err();

    assert!(matches!(err, Error::ConfigurationError(_)));
    assert!(!ws.output().exists());
    assert!(!ws.output().parent().unwrap().exists());
    assert!(!ws.scratch().exists());
}

#[test]
fn test_every_entry_has_a_content_type() {
    let ws = Workspace::new();
    let linked = ws.deck("linked.pptx", FixtureDeck::new().slide_with_link("L1").with_notes());
    ws.merge(&[(&ws.a, 1), (&ws.b, 2), (&linked, 1)]);

    let types = ContentTypes::parse(&read_entry(&ws.output(), "[Content_Types].xml")).unwrap();
    for name in entry_names(&ws.output()) {
        if name != "[Content_Types].xml" {
            assert!(types.lookup(&name).is_some(), "{} has no content type", name);
        }
    }
    for slide in parts_in(&ws.output(), "ppt/slides") {
        assert_eq!(types.lookup(&slide), Some(CT_SLIDE), "{}", slide);
    }
}

#[test]
fn test_shared_master_registered_once() {
    let ws = Workspace::new();
    let report = ws.merge(&[(&ws.a, 1), (&ws.b, 1), (&ws.b, 2), (&ws.a, 3)]);

    let presentation = read_entry(&ws.output(), "ppt/presentation.xml");
    // A's own master plus B's, however many slides use them.
    assert_eq!(ids(&presentation, "sldMasterId").len(), 2);
    assert_eq!(report.masters_registered, 1);
    assert_eq!(parts_in(&ws.output(), "ppt/slideMasters").len(), 2);
}

#[test]
fn test_ids_are_unique_and_in_range() {
    let ws = Workspace::new();
    let c = ws.deck("c.pptx", FixtureDeck::new().slide("C1"));
    ws.merge(&[(&ws.a, 1), (&ws.b, 1), (&c, 1), (&ws.b, 2)]);

    let presentation = read_entry(&ws.output(), "ppt/presentation.xml");
    let mut template_ids = ids(&presentation, "sldMasterId");
    for master in parts_in(&ws.output(), "ppt/slideMasters") {
        template_ids.extend(ids(&read_entry(&ws.output(), &master), "sldLayoutId"));
    }
    assert_eq!(template_ids.len(), 3 * 3);
    let unique: HashSet<u32> = template_ids.iter().copied().collect();
    assert_eq!(unique.len(), template_ids.len());
    assert!(template_ids.iter().all(|&id| id >= 0x8000_0000));

    let slide_ids = ids(&presentation, "sldId");
    assert_eq!(slide_ids.len(), 4);
    let unique: HashSet<u32> = slide_ids.iter().copied().collect();
    assert_eq!(unique.len(), 4);
    assert!(slide_ids.iter().all(|&id| (256..0x8000_0000).contains(&id)));
}

#[test]
fn test_relationship_targets_exist() {
    let ws = Workspace::new();
    let noted = ws.deck("noted.pptx", FixtureDeck::new().slide("N1").slide_with_image("N2").with_notes());
    ws.merge(&[(&ws.b, 2), (&noted, 2), (&ws.a, 3), (&noted, 1)]);

    let entries = entry_set(&ws.output());
    for name in entries.iter().filter(|n| n.ends_with(".rels")) {
        let owner = rels_owner(name).unwrap();
        assert!(owner.is_empty() || entries.contains(&owner), "orphan sidecar {}", name);

        let rels = Relationships::parse(&read_entry(&ws.output(), name)).unwrap();
        let mut rel_ids = HashSet::new();
        for rel in rels.iter() {
            assert!(rel_ids.insert(rel.id.clone()), "duplicate {} in {}", rel.id, name);
            if rel.is_external() {
                continue;
            }
            let target = resolve_target(&owner, &rel.target).unwrap();
            assert!(entries.contains(&target), "{} -> {} is dangling", name, target);
        }
    }
}

#[test]
fn test_unrequested_skeleton_slides_are_pruned() {
    let ws = Workspace::new();
    ws.merge(&[(&ws.a, 2)]);

    assert_eq!(parts_in(&ws.output(), "ppt/slides"), vec!["ppt/slides/slide2.xml"]);
    let types = ContentTypes::parse(&read_entry(&ws.output(), "[Content_Types].xml")).unwrap();
    assert!(types.override_for("ppt/slides/slide1.xml").is_none());
    assert!(types.override_for("ppt/slides/slide3.xml").is_none());

    let presentation = read_entry(&ws.output(), "ppt/presentation.xml");
    assert!(!presentation.contains("p:extLst"));
}

#[test]
fn test_keep_unreferenced_leaves_skeleton_slides() {
    let ws = Workspace::new();
    ws.merge_with(&[(&ws.a, 2)], ws.options().with_prune_unreferenced(false));

    assert_eq!(parts_in(&ws.output(), "ppt/slides").len(), 3);
    assert_eq!(titles(&ws.output()), vec![Some("A2".to_string())]);
}

#[test]
fn test_notes_master_is_shared() {
    let ws = Workspace::new();
    let first = ws.deck("first.pptx", FixtureDeck::new().slide("F1").with_notes());
    let second = ws.deck("second.pptx", FixtureDeck::new().slide("S1").with_notes());
    ws.merge(&[(&first, 1), (&second, 1)]);

    assert_eq!(parts_in(&ws.output(), "ppt/notesMasters").len(), 1);
    assert_eq!(parts_in(&ws.output(), "ppt/notesSlides").len(), 2);

    let presentation = read_entry(&ws.output(), "ppt/presentation.xml");
    assert_eq!(presentation.matches("<p:notesMasterId ").count(), 1);
}

#[test]
fn test_notes_master_added_when_skeleton_has_none() {
    let ws = Workspace::new();
    let noted = ws.deck("noted.pptx", FixtureDeck::new().slide("N1").with_notes());
    ws.merge(&[(&ws.a, 1), (&noted, 1)]);

    assert_eq!(
        parts_in(&ws.output(), "ppt/notesMasters"),
        vec!["ppt/notesMasters/notesMaster1.xml"]
    );
    let presentation = read_entry(&ws.output(), "ppt/presentation.xml");
    let notes_list = presentation.find("<p:notesMasterIdLst>").unwrap();
    let slide_list = presentation.find("<p:sldIdLst>").unwrap();
    assert!(notes_list < slide_list);

    let rels = Relationships::parse(&read_entry(&ws.output(), "ppt/_rels/presentation.xml.rels")).unwrap();
    let notes_master = rels.first_of_kind("notesMaster").unwrap();
    assert_eq!(notes_master.target, "notesMasters/notesMaster1.xml");
}

#[test]
fn test_external_links_are_kept_verbatim() {
    let ws = Workspace::new();
    let linked = ws.deck("linked.pptx", FixtureDeck::new().slide_with_link("L1"));
    ws.merge(&[(&ws.a, 1), (&linked, 1)]);

    let summary = PptxParser::new().parse_file(&ws.output()).unwrap();
    let rels = Relationships::parse(&read_entry(&ws.output(), &rels_path(&summary.slides[1].part))).unwrap();
    let link = rels.iter().find(|r| r.is_external()).unwrap();
    assert_eq!(link.target, "https://example.com/songs?id=1&v=2");
}

#[test]
fn test_package_entry_order_and_compression() {
    let ws = Workspace::new();
    ws.merge_with(
        &[(&ws.a, 1), (&ws.b, 2)],
        ws.options().with_compression(Compression::Stored),
    );

    let names = entry_names(&ws.output());
    assert_eq!(names[0], "[Content_Types].xml");
    assert_eq!(names[1], "_rels/.rels");
    assert!(names.iter().all(|n| !n.starts_with('/') && !n.ends_with('/')));

    let mut archive = ZipArchive::new(File::open(ws.output()).unwrap()).unwrap();
    let image = archive.by_name(&parts_in(&ws.output(), "ppt/media")[0]).unwrap();
    assert_eq!(image.compression(), CompressionMethod::Stored);
}

#[test]
fn test_scratch_removed_after_success_and_failure() {
    let ws = Workspace::new();
    ws.merge(&[(&ws.a, 1), (&ws.b, 1)]);
    assert!(ws.scratch_is_empty());

    let missing = ws.dir.path().join("missing.pptx");
    let err = DeckMerger::new(ws.dir.path().join("failed.pptx"))
        .with_options(ws.options())
        .add_slide(&ws.a, 1)
        .add_slide(&missing, 1)
        .merge()
        .unwrap_err();
    assert!(matches!(err, Error::SourceUnavailable { ref path, .. } if *path == missing));
    assert!(ws.scratch_is_empty());
    assert!(!ws.dir.path().join("failed.pptx").exists());
}

#[test]
fn test_unreadable_sources_are_unavailable() {
    let ws = Workspace::new();
    let text = ws.dir.path().join("text.pptx");
    fs::write(&text, "this is not a presentation").unwrap();
    let legacy = ws.dir.path().join("legacy.ppt");
    fs::write(&legacy, [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1, 0, 0, 0, 0]).unwrap();
    let truncated = ws.dir.path().join("truncated.pptx");
    let whole = fs::read(&ws.a).unwrap();
    fs::write(&truncated, &whole[..whole.len() / 2]).unwrap();

    for source in [&text, &legacy, &truncated] {
        let err = merge_slides(&[SlideRequest::new(source, 1)], &ws.output(), &ws.options()).unwrap_err();
        assert!(
            matches!(err, Error::SourceUnavailable { .. }),
            "{}: {}",
            source.display(),
            err
        );
    }
    assert!(!ws.output().exists());
    assert!(ws.scratch_is_empty());
}

#[test]
fn test_existing_output_is_replaced() {
    let ws = Workspace::new();
    fs::create_dir_all(ws.output().parent().unwrap()).unwrap();
    fs::write(ws.output(), "stale").unwrap();

    ws.merge(&[(&ws.b, 1)]);

    assert_eq!(titles(&ws.output()), vec![Some("B1".to_string())]);
    let leftovers = fs::read_dir(ws.output().parent().unwrap()).unwrap().count();
    assert_eq!(leftovers, 1);
}

#[test]
fn test_independent_sessions_run_in_parallel() {
    let ws = Workspace::new();
    let first = ws.dir.path().join("first.pptx");
    let second = ws.dir.path().join("second.pptx");
    let options = ws.options();
    let jobs = [
        (&first, vec![SlideRequest::new(&ws.a, 1), SlideRequest::new(&ws.b, 2)]),
        (&second, vec![SlideRequest::new(&ws.b, 1), SlideRequest::new(&ws.a, 3)]),
    ];

    // One shared scratch root; each session keeps its own area under it.
    std::thread::scope(|scope| {
        let handles: Vec<_> = jobs
            .iter()
            .map(|(output, requests)| {
                let options = &options;
                scope.spawn(move || merge_slides(requests, output, options))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }
    });

    assert_eq!(titles(&first), vec![Some("A1".to_string()), Some("B2".to_string())]);
    assert_eq!(titles(&second), vec![Some("B1".to_string()), Some("A3".to_string())]);
    assert!(ws.scratch_is_empty());
}
