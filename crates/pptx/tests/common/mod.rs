//! Shared fixtures for the merge integration tests.
//!
//! Builds small but structurally complete presentations: one master with two
//! layouts and a theme, titled slides, optional shared image, optional notes
//! (with their own notes master and theme) and optional external hyperlink.

#![allow(dead_code)]

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const CT: &str = "application/vnd.openxmlformats-officedocument.presentationml";

/// A 1x1 PNG.
const PNG: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4, 0x89,
];

#[derive(Debug, Clone)]
struct FixtureSlide {
    title: String,
    layout: usize,
    image: bool,
    link: bool,
}

/// Builder for a fixture presentation.
#[derive(Debug, Clone, Default)]
pub struct FixtureDeck {
    slides: Vec<FixtureSlide>,
    notes: bool,
}

impl FixtureDeck {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a slide on layout 1 whose title placeholder reads `title`.
    pub fn slide(mut self, title: &str) -> Self {
        self.slides.push(FixtureSlide {
            title: title.to_string(),
            layout: 1,
            image: false,
            link: false,
        });
        self
    }

    /// Add a slide on layout 2 that shows the deck's image.
    pub fn slide_with_image(mut self, title: &str) -> Self {
        self.slides.push(FixtureSlide {
            title: title.to_string(),
            layout: 2,
            image: true,
            link: false,
        });
        self
    }

    /// Add a slide with an external hyperlink.
    pub fn slide_with_link(mut self, title: &str) -> Self {
        self.slides.push(FixtureSlide {
            title: title.to_string(),
            layout: 1,
            image: false,
            link: true,
        });
        self
    }

    /// Give every slide a notes page.
    pub fn with_notes(mut self) -> Self {
        self.notes = true;
        self
    }

    /// Write the package to `path`.
    pub fn write(&self, path: &Path) {
        let file = File::create(path).unwrap();
        let mut zip = ZipWriter::new(file);
        let options = FileOptions::default();
        for (name, body) in self.parts() {
            zip.start_file(name, options).unwrap();
            zip.write_all(&body).unwrap();
        }
        zip.finish().unwrap();
    }

    fn parts(&self) -> Vec<(String, Vec<u8>)> {
        let mut parts: Vec<(String, Vec<u8>)> = Vec::new();
        let mut add = |name: &str, body: String| parts.push((name.to_string(), body.into_bytes()));

        add("[Content_Types].xml", self.content_types());
        add(
            "_rels/.rels",
            rels(&[("rId1", "officeDocument", "ppt/presentation.xml", false)]),
        );
        add("ppt/presentation.xml", self.presentation());
        add("ppt/_rels/presentation.xml.rels", self.presentation_rels());

        add("ppt/slideMasters/slideMaster1.xml", master());
        add(
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            rels(&[
                ("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml", false),
                ("rId2", "slideLayout", "../slideLayouts/slideLayout2.xml", false),
                ("rId3", "theme", "../theme/theme1.xml", false),
            ]),
        );
        for n in 1..=2 {
            add(&format!("ppt/slideLayouts/slideLayout{}.xml", n), layout(n));
            add(
                &format!("ppt/slideLayouts/_rels/slideLayout{}.xml.rels", n),
                rels(&[("rId1", "slideMaster", "../slideMasters/slideMaster1.xml", false)]),
            );
        }
        add("ppt/theme/theme1.xml", theme("Office"));

        for (i, slide) in self.slides.iter().enumerate() {
            let n = i + 1;
            add(&format!("ppt/slides/slide{}.xml", n), slide_xml(&slide.title));

            let layout_target = format!("../slideLayouts/slideLayout{}.xml", slide.layout);
            let notes_target = format!("../notesSlides/notesSlide{}.xml", n);
            let mut slide_rels = vec![("rId1", "slideLayout", layout_target.as_str(), false)];
            if slide.image {
                slide_rels.push(("rId2", "image", "../media/image1.png", false));
            }
            if self.notes {
                slide_rels.push(("rId3", "notesSlide", notes_target.as_str(), false));
            }
            if slide.link {
                slide_rels.push(("rId4", "hyperlink", "https://example.com/songs?id=1&v=2", true));
            }
            add(&format!("ppt/slides/_rels/slide{}.xml.rels", n), rels(&slide_rels));

            if self.notes {
                let slide_target = format!("../slides/slide{}.xml", n);
                add(&format!("ppt/notesSlides/notesSlide{}.xml", n), notes_slide(&slide.title));
                add(
                    &format!("ppt/notesSlides/_rels/notesSlide{}.xml.rels", n),
                    rels(&[
                        ("rId1", "notesMaster", "../notesMasters/notesMaster1.xml", false),
                        ("rId2", "slide", slide_target.as_str(), false),
                    ]),
                );
            }
        }

        if self.notes {
            add("ppt/notesMasters/notesMaster1.xml", notes_master());
            add(
                "ppt/notesMasters/_rels/notesMaster1.xml.rels",
                rels(&[("rId1", "theme", "../theme/theme2.xml", false)]),
            );
            add("ppt/theme/theme2.xml", theme("Notes"));
        }

        if self.slides.iter().any(|s| s.image) {
            parts.push(("ppt/media/image1.png".to_string(), PNG.to_vec()));
        }
        parts
    }

    fn content_types(&self) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="png" ContentType="image/png"/>"#,
        );
        let mut over = |part: &str, kind: &str| {
            xml.push_str(&format!(
                r#"<Override PartName="/{}" ContentType="{}.{}+xml"/>"#,
                part, CT, kind
            ));
        };
        over("ppt/presentation.xml", "presentation.main");
        over("ppt/slideMasters/slideMaster1.xml", "slideMaster");
        over("ppt/slideLayouts/slideLayout1.xml", "slideLayout");
        over("ppt/slideLayouts/slideLayout2.xml", "slideLayout");
        for n in 1..=self.slides.len() {
            over(&format!("ppt/slides/slide{}.xml", n), "slide");
            if self.notes {
                over(&format!("ppt/notesSlides/notesSlide{}.xml", n), "notesSlide");
            }
        }
        if self.notes {
            over("ppt/notesMasters/notesMaster1.xml", "notesMaster");
        }
        xml.push_str(r#"<Override PartName="/ppt/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/>"#);
        if self.notes {
            xml.push_str(r#"<Override PartName="/ppt/theme/theme2.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/>"#);
        }
        xml.push_str("</Types>");
        xml
    }

    fn presentation(&self) -> String {
        let count = self.slides.len();
        let mut xml = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:presentation xmlns:a="{}" xmlns:r="{}" xmlns:p="{}" saveSubsetFonts="1"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>"#,
            NS_A, NS_R, NS_P
        );
        if self.notes {
            xml.push_str(&format!(
                r#"<p:notesMasterIdLst><p:notesMasterId r:id="rId{}"/></p:notesMasterIdLst>"#,
                count + 3
            ));
        }
        xml.push_str("<p:sldIdLst>");
        for i in 0..count {
            xml.push_str(&format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + i, i + 2));
        }
        xml.push_str(
            r#"</p:sldIdLst><p:sldSz cx="12192000" cy="6858000"/><p:notesSz cx="6858000" cy="9144000"/><p:defaultTextStyle/><p:extLst><p:ext uri="{521415D9-36F7-43E2-AB2F-B90AF26B5E84}"><p14:sectionLst xmlns:p14="http://schemas.microsoft.com/office/powerpoint/2010/main"/></p:ext></p:extLst></p:presentation>"#,
        );
        xml
    }

    fn presentation_rels(&self) -> String {
        let count = self.slides.len();
        let slide_targets: Vec<(String, String)> = (0..count)
            .map(|i| (format!("rId{}", i + 2), format!("slides/slide{}.xml", i + 1)))
            .collect();
        let theme_id = format!("rId{}", count + 2);
        let notes_id = format!("rId{}", count + 3);

        let mut entries = vec![("rId1", "slideMaster", "slideMasters/slideMaster1.xml", false)];
        for (id, target) in &slide_targets {
            entries.push((id.as_str(), "slide", target.as_str(), false));
        }
        entries.push((theme_id.as_str(), "theme", "theme/theme1.xml", false));
        if self.notes {
            entries.push((notes_id.as_str(), "notesMaster", "notesMasters/notesMaster1.xml", false));
        }
        rels(&entries)
    }
}

fn rels(entries: &[(&str, &str, &str, bool)]) -> String {
    let mut xml = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="{}">"#,
        NS_RELS
    );
    for (id, kind, target, external) in entries {
        let target = target.replace('&', "&amp;");
        let mode = if *external { r#" TargetMode="External""# } else { "" };
        xml.push_str(&format!(
            r#"<Relationship Id="{}" Type="{}/{}" Target="{}"{}/>"#,
            id, REL, kind, target, mode
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

fn master() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sldMaster xmlns:a="{}" xmlns:r="{}" xmlns:p="{}"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/><p:sldLayoutId id="2147483650" r:id="rId2"/></p:sldLayoutIdLst></p:sldMaster>"#,
        NS_A, NS_R, NS_P
    )
}

fn layout(n: usize) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sldLayout xmlns:a="{}" xmlns:r="{}" xmlns:p="{}"><p:cSld name="Layout {}"><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree></p:cSld></p:sldLayout>"#,
        NS_A, NS_R, NS_P, n
    )
}

fn theme(name: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><a:theme xmlns:a="{}" name="{}"><a:themeElements/></a:theme>"#,
        NS_A, name
    )
}

fn slide_xml(title: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sld xmlns:a="{}" xmlns:r="{}" xmlns:p="{}"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/><p:sp><p:nvSpPr><p:cNvPr id="2" name="Title 1"/><p:cNvSpPr/><p:nvPr><p:ph type="title"/></p:nvPr></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp><p:sp><p:nvSpPr><p:cNvPr id="3" name="Body 2"/><p:cNvSpPr/><p:nvPr><p:ph idx="1"/></p:nvPr></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:p><a:r><a:t>Body of {}</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>"#,
        NS_A, NS_R, NS_P, title, title
    )
}

fn notes_slide(title: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:notes xmlns:a="{}" xmlns:r="{}" xmlns:p="{}"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/><p:sp><p:nvSpPr><p:cNvPr id="2" name="Notes"/><p:cNvSpPr/><p:nvPr><p:ph type="body" idx="1"/></p:nvPr></p:nvSpPr><p:spPr/><p:txBody><a:bodyPr/><a:p><a:r><a:t>Notes for {}</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:notes>"#,
        NS_A, NS_R, NS_P, title
    )
}

fn notes_master() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:notesMaster xmlns:a="{}" xmlns:r="{}" xmlns:p="{}"><p:cSld><p:spTree><p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr/></p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/></p:notesMaster>"#,
        NS_A, NS_R, NS_P
    )
}

/// Names of every entry in the archive at `path`, in archive order.
pub fn entry_names(path: &Path) -> Vec<String> {
    let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

/// Entry names sorted, for set-like comparisons.
pub fn entry_set(path: &Path) -> BTreeSet<String> {
    entry_names(path).into_iter().collect()
}

/// Text of one entry.
pub fn read_entry(path: &Path, name: &str) -> String {
    let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut body = String::new();
    entry.read_to_string(&mut body).unwrap();
    body
}

/// Entries under `folder/` that are not relationship sidecars.
pub fn parts_in(path: &Path, folder: &str) -> Vec<String> {
    let prefix = format!("{}/", folder);
    entry_set(path)
        .into_iter()
        .filter(|name| name.starts_with(&prefix) && !name.contains("/_rels/"))
        .collect()
}
