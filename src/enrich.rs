use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::tree::{ActivityEntry, NodeKind, VaultTree};

pub const DEFAULT_OWNER: &str = "System";
pub const ENCRYPTED_SUFFIX: &str = ".enc";
pub const ENCRYPTION_ALGORITHM: &str = "AES-256-GCM";
pub const NO_ENCRYPTION: &str = "None";
pub const STATUS_VERIFIED: &str = "Verified";
pub const STATUS_UNVERIFIED: &str = "Unverified";
pub const DEFAULT_PERMISSIONS: &str = "rw-r--r--";
pub const DEFAULT_MIME: &str = "application/octet-stream";

const CREATED_AT: &str = "2024-01-15 09:30";
const MODIFIED_AT: &str = "2024-03-02 14:12";
const ACCESSED_AT: &str = "2024-03-10 08:45";

/// Extension (lowercase, no dot) to MIME type.
const MIME_TABLE: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("log", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("js", "text/javascript"),
    ("json", "application/json"),
    ("xml", "application/xml"),
    ("yaml", "application/yaml"),
    ("yml", "application/yaml"),
    ("toml", "application/toml"),
    ("pdf", "application/pdf"),
    ("doc", "application/msword"),
    ("docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
    ("xlsx", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("tar", "application/x-tar"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("svg", "image/svg+xml"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
    ("mp4", "video/mp4"),
    ("mov", "video/quicktime"),
];

/// Fill in default metadata once after load.
///
/// Every node gets a `path`; files also get owner, encryption, checksum,
/// timestamps, activity, mime, permissions and status. Values already present
/// are kept, so running this twice changes nothing.
pub fn enrich(tree: &mut VaultTree) {
    let mut pending: Vec<(String, Option<String>)> = Vec::with_capacity(tree.len());
    tree.walk(|node, ancestors| {
        let path = node.path.is_none().then(|| {
            // Skip the virtual root: its name is not part of any location.
            let segments = ancestors.iter().skip(1).map(|a| a.name.as_str());
            if ancestors.is_empty() {
                "/".to_string()
            } else {
                join_path(segments.chain(std::iter::once(node.name.as_str())))
            }
        });
        pending.push((node.id.clone(), path));
    });

    let mut touched = 0usize;
    for (id, path) in pending {
        let Some(node) = tree.find_by_id_mut(&id) else {
            continue;
        };
        if let Some(path) = path {
            node.path.get_or_insert(path);
        }

        let NodeKind::File(meta) = &mut node.kind else {
            continue;
        };
        let name = node.name.as_str();
        let encryption = meta
            .encryption
            .get_or_insert_with(|| encryption_for(name).to_string())
            .clone();
        meta.owner.get_or_insert_with(|| DEFAULT_OWNER.to_string());
        meta.checksum.get_or_insert_with(|| checksum_for(&id));
        meta.created.get_or_insert_with(|| CREATED_AT.to_string());
        meta.modified.get_or_insert_with(|| MODIFIED_AT.to_string());
        meta.accessed.get_or_insert_with(|| ACCESSED_AT.to_string());
        meta.activity.get_or_insert_with(default_activity);
        meta.mime.get_or_insert_with(|| mime_for(name).to_string());
        meta.permissions
            .get_or_insert_with(|| DEFAULT_PERMISSIONS.to_string());
        meta.status
            .get_or_insert_with(|| status_for(&encryption).to_string());
        touched += 1;
    }

    tracing::debug!(files = touched, "metadata enrichment applied");
}

/// `/`-prefixed join with doubled separators collapsed.
fn join_path<'a>(segments: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::from("/");
    for segment in segments {
        if !out.ends_with('/') {
            out.push('/');
        }
        out.push_str(segment);
    }

    let mut collapsed = String::with_capacity(out.len());
    for ch in out.chars() {
        if ch == '/' && collapsed.ends_with('/') {
            continue;
        }
        collapsed.push(ch);
    }
    collapsed
}

pub fn encryption_for(name: &str) -> &'static str {
    if name.ends_with(ENCRYPTED_SUFFIX) {
        ENCRYPTION_ALGORITHM
    } else {
        NO_ENCRYPTION
    }
}

pub fn status_for(encryption: &str) -> &'static str {
    if encryption == NO_ENCRYPTION {
        STATUS_UNVERIFIED
    } else {
        STATUS_VERIFIED
    }
}

pub fn mime_for(name: &str) -> &'static str {
    let Some((stem, ext)) = name.rsplit_once('.') else {
        return DEFAULT_MIME;
    };
    if stem.is_empty() {
        return DEFAULT_MIME;
    }
    let ext = ext.to_ascii_lowercase();
    MIME_TABLE
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or(DEFAULT_MIME)
}

/// Display-only digest of the id. Not a content hash.
fn checksum_for(id: &str) -> String {
    let mut first = DefaultHasher::new();
    id.hash(&mut first);
    let mut second = DefaultHasher::new();
    (id, "vault").hash(&mut second);
    format!("{:016x}{:016x}", first.finish(), second.finish())
}

fn default_activity() -> Vec<ActivityEntry> {
    vec![
        ActivityEntry {
            who: DEFAULT_OWNER.to_string(),
            what: "Uploaded".to_string(),
            when: CREATED_AT.to_string(),
            avatar: "SY".to_string(),
        },
        ActivityEntry {
            who: DEFAULT_OWNER.to_string(),
            what: "Integrity check".to_string(),
            when: MODIFIED_AT.to_string(),
            avatar: "SY".to_string(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::tests::{file, folder};
    use crate::tree::{FileMeta, NodeKind, RawNode, TreeNode, ROOT_ID};

    fn meta(tree: &VaultTree, id: &str) -> FileMeta {
        tree.find_by_id(id).and_then(|n| n.file_meta()).cloned().unwrap()
    }

    #[test]
    fn test_report_json_gets_mime_and_is_idempotent() {
        let mut tree = VaultTree::from_forest(vec![folder(
            "docs",
            "Docs",
            vec![file("report", "report.json")],
        )]);
        enrich(&mut tree);
        let once = meta(&tree, "report");
        assert_eq!(once.mime.as_deref(), Some("application/json"));

        enrich(&mut tree);
        assert_eq!(meta(&tree, "report"), once);
        assert_eq!(
            tree.find_by_id("report").and_then(|n| n.path.clone()).as_deref(),
            Some("/Docs/report.json")
        );
    }

    #[test]
    fn test_paths() {
        let mut tree = VaultTree::from_forest(vec![
            folder("a", "A", vec![folder("b", "B/", vec![file("c", "/c.txt")])]),
            file("top", "top.txt"),
        ]);
        enrich(&mut tree);

        let path = |id: &str| tree.find_by_id(id).and_then(|n| n.path.clone()).unwrap();
        assert_eq!(path(ROOT_ID), "/");
        assert_eq!(path("a"), "/A");
        assert_eq!(path("c"), "/A/B/c.txt");
        assert_eq!(path("top"), "/top.txt");
    }

    #[test]
    fn test_existing_values_win() {
        let custom = RawNode {
            node: TreeNode {
                id: "s".into(),
                name: "secret.enc".into(),
                path: Some("/custom/place".into()),
                kind: NodeKind::File(FileMeta {
                    owner: Some("alice".into()),
                    status: Some("Quarantined".into()),
                    ..FileMeta::default()
                }),
            },
            children: Vec::new(),
        };
        let mut tree = VaultTree::from_forest(vec![custom]);
        enrich(&mut tree);

        let m = meta(&tree, "s");
        assert_eq!(m.owner.as_deref(), Some("alice"));
        assert_eq!(m.status.as_deref(), Some("Quarantined"));
        assert_eq!(m.encryption.as_deref(), Some(ENCRYPTION_ALGORITHM));
        assert_eq!(
            tree.find_by_id("s").and_then(|n| n.path.as_deref()),
            Some("/custom/place")
        );

        // A record-supplied path must not opt the file out of the other defaults.
        assert_eq!(m.checksum, Some(checksum_for("s")));
        assert_eq!(m.created.as_deref(), Some(CREATED_AT));
        assert_eq!(m.permissions.as_deref(), Some(DEFAULT_PERMISSIONS));
        assert_eq!(m.mime.as_deref(), Some(DEFAULT_MIME));
        assert!(m.activity.is_some());
    }

    #[test]
    fn test_every_file_is_complete() {
        let mut tree = VaultTree::from_forest(vec![
            file("plain", "notes.txt"),
            file("locked", "vault.tar.enc"),
            file("bare", "Makefile"),
        ]);
        enrich(&mut tree);

        for id in ["plain", "locked", "bare"] {
            let m = meta(&tree, id);
            assert!(m.owner.is_some() && m.checksum.is_some() && m.created.is_some());
            assert!(m.modified.is_some() && m.accessed.is_some() && m.permissions.is_some());
            assert!(m.activity.as_ref().is_some_and(|a| !a.is_empty()));
        }
        assert_eq!(meta(&tree, "plain").status.as_deref(), Some(STATUS_UNVERIFIED));
        assert_eq!(meta(&tree, "locked").status.as_deref(), Some(STATUS_VERIFIED));
        assert_eq!(meta(&tree, "bare").mime.as_deref(), Some(DEFAULT_MIME));
        assert!(tree.root().file_meta().is_none());
    }

    #[test]
    fn test_checksum_is_stable_per_id() {
        assert_eq!(checksum_for("abc"), checksum_for("abc"));
        assert_ne!(checksum_for("abc"), checksum_for("abd"));
        assert_eq!(checksum_for("abc").len(), 32);
    }

    #[test]
    fn test_mime_lookup() {
        assert_eq!(mime_for("photo.JPG"), "image/jpeg");
        assert_eq!(mime_for("archive.tar.gz"), "application/gzip");
        assert_eq!(mime_for(".bashrc"), DEFAULT_MIME);
        assert_eq!(mime_for("data.enc"), DEFAULT_MIME);
    }
}
