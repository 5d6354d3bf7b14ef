//! Filesystem-safe names for artifacts and the small input normalizers the
//! handlers share.

use std::borrow::Cow;

use crate::models::ArtifactKind;

/// Longest stem kept from user input
const MAX_STEM_LEN: usize = 150;
/// Longer digit runs are not Scratch ids and would overflow file name limits
pub const MAX_PROJECT_ID_LEN: usize = 20;

/// Replace every character outside `[A-Za-z0-9]` with `_`, one per character.
///
/// `https://example.com` becomes `https___example_com`. The result is
/// truncated to a fixed length and never empty.
pub fn sanitize(input: &str) -> String {
    let stem: String = input
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .take(MAX_STEM_LEN)
        .collect();

    if stem.is_empty() {
        "artifact".to_string()
    } else {
        stem
    }
}

/// Public file name offered to the caller in `Content-Disposition`
pub fn download_name(kind: ArtifactKind, input: &str) -> String {
    match kind {
        ArtifactKind::PageSnapshot => format!("{}.{}", sanitize(input), kind.extension()),
        ArtifactKind::ProjectArchive => {
            format!("scratch-project-{}.{}", sanitize(input), kind.extension())
        }
        ArtifactKind::QrImage => format!("qrcode.{}", kind.extension()),
    }
}

/// On-disk file name: sanitized stem, disambiguator, kind extension
pub fn artifact_file_name(kind: ArtifactKind, input: &str, token: &str) -> String {
    match kind {
        ArtifactKind::QrImage => format!("qr_{}.{}", token, kind.extension()),
        _ => format!("{}_{}.{}", sanitize(input), token, kind.extension()),
    }
}

/// A single path component is safe if it cannot climb out of or past its parent
pub fn is_safe_component(component: &str) -> bool {
    !component.is_empty()
        && component != "."
        && component != ".."
        && !component.contains(['/', '\\', '\0'])
}

fn has_http_scheme(input: &str) -> bool {
    let lower = input.get(..8).unwrap_or(input).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Leading run of `[\w.-]` containing a dot followed by two or more letters
fn looks_like_domain(input: &str) -> bool {
    let run: Vec<char> = input
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    (1..run.len().saturating_sub(2)).any(|i| {
        run[i] == '.' && run[i + 1].is_ascii_alphabetic() && run[i + 2].is_ascii_alphabetic()
    })
}

/// Prefix `https://` to bare domains such as `example.com/path`
pub fn complete_url(input: &str) -> Cow<'_, str> {
    if !has_http_scheme(input) && looks_like_domain(input) {
        Cow::Owned(format!("https://{}", input))
    } else {
        Cow::Borrowed(input)
    }
}

/// Scratch project id from a bare id or any URL containing `projects/<id>`.
/// `None` when no digits are found or the id exceeds `MAX_PROJECT_ID_LEN`.
pub fn extract_project_id(input: &str) -> Option<String> {
    let from_url = input.match_indices("projects/").find_map(|(idx, marker)| {
        let digits: String = input[idx + marker.len()..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        (!digits.is_empty()).then_some(digits)
    });

    let id = from_url.unwrap_or_else(|| input.chars().filter(|c| c.is_ascii_digit()).collect());
    (!id.is_empty() && id.len() <= MAX_PROJECT_ID_LEN).then_some(id)
}
