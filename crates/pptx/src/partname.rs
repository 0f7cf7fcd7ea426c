//! Part-name arithmetic inside an OPC package.
//!
//! Parts are addressed by package-root-relative names with forward slashes and
//! no leading slash (`ppt/slides/slide1.xml`), which is also how they appear
//! as ZIP members. The package itself is the empty name `""`.

use std::borrow::Cow;

/// Directory portion of a part name; `""` for parts at the package root.
pub fn directory(part: &str) -> &str {
    match part.rfind('/') {
        Some(pos) => &part[..pos],
        None => "",
    }
}

/// File-name portion of a part name.
pub fn file_name(part: &str) -> &str {
    match part.rfind('/') {
        Some(pos) => &part[pos + 1..],
        None => part,
    }
}

/// Extension of a part name without the leading dot; `""` when there is none.
pub fn extension(part: &str) -> &str {
    let name = file_name(part);
    match name.rfind('.') {
        Some(pos) => &name[pos + 1..],
        None => "",
    }
}

/// File name without its extension.
pub fn stem(part: &str) -> &str {
    let name = file_name(part);
    match name.rfind('.') {
        Some(pos) if pos > 0 => &name[..pos],
        _ => name,
    }
}

/// The content-types form of a part name (`/ppt/slides/slide1.xml`).
pub fn part_uri(part: &str) -> String {
    format!("/{}", part.trim_start_matches('/'))
}

/// Name of the relationships sidecar for `part`.
///
/// `ppt/slides/slide1.xml` → `ppt/slides/_rels/slide1.xml.rels`, and the
/// package itself (`""`) → `_rels/.rels`.
pub fn rels_path(part: &str) -> String {
    let dir = directory(part);
    let name = file_name(part);
    if dir.is_empty() {
        format!("_rels/{}.rels", name)
    } else {
        format!("{}/_rels/{}.rels", dir, name)
    }
}

/// Inverse of [`rels_path`]: the part a `.rels` sidecar belongs to.
pub fn rels_owner(rels: &str) -> Option<String> {
    let name = file_name(rels).strip_suffix(".rels")?;
    let dir = directory(rels);
    let owner_dir = if dir == "_rels" {
        ""
    } else {
        dir.strip_suffix("/_rels")?
    };
    if owner_dir.is_empty() {
        Some(name.to_string())
    } else {
        Some(format!("{}/{}", owner_dir, name))
    }
}

/// Resolve a relationship `Target` written in `source_part`'s sidecar to a
/// package-root-relative part name.
///
/// Handles `/`-rooted targets and targets relative to the source part's
/// directory, and percent-decodes them (`my%20clip.mp4` names the member
/// `my clip.mp4`). Returns `None` when the target climbs above the package
/// root or resolves to nothing.
pub fn resolve_target(source_part: &str, target: &str) -> Option<String> {
    let target = target.split('#').next().unwrap_or_default();
    if target.is_empty() {
        return None;
    }
    let target = urlencoding::decode(target).ok()?;
    let target = target.as_ref();
    let joined = if let Some(absolute) = target.strip_prefix('/') {
        absolute.to_string()
    } else {
        let base = directory(source_part);
        if base.is_empty() {
            target.to_string()
        } else {
            format!("{}/{}", base, target)
        }
    };
    normalize(&joined)
}

/// Relative reference from `source_part`'s directory to `target_part`,
/// percent-encoded.
///
/// `ppt/slides/slide3.xml` → `ppt/slideLayouts/slideLayout2.xml` gives
/// `../slideLayouts/slideLayout2.xml`.
pub fn relative_target(source_part: &str, target_part: &str) -> String {
    let from: Vec<&str> = directory(source_part)
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    let to: Vec<&str> = target_part.split('/').filter(|s| !s.is_empty()).collect();

    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();
    // Never consume the file name itself as a shared directory.
    let common = common.min(to.len().saturating_sub(1));

    let mut segments: Vec<Cow<'_, str>> = Vec::new();
    segments.extend(std::iter::repeat(Cow::Borrowed("..")).take(from.len() - common));
    segments.extend(to[common..].iter().map(|s| urlencoding::encode(s)));
    segments.join("/")
}

/// Collapse `.` and `..` segments; `None` if the path escapes the root.
fn normalize(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
