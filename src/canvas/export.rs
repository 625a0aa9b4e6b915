use super::{CanvasDocument, CanvasItem, Section, SectionBody};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to encode canvas: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to write {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ExportedSection {
    id: String,
    order: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    items: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subsections: Option<Vec<ExportedSubsection>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ExportedSubsection {
    title: String,
    items: Vec<String>,
}

fn texts(items: &[CanvasItem]) -> Vec<String> {
    items.iter().map(|item| item.text.clone()).collect()
}

fn exported_section(section: &Section) -> ExportedSection {
    match &section.body {
        SectionBody::Simple { title, items } => ExportedSection {
            id: section.id.clone(),
            order: section.display_order,
            title: Some(title.clone()),
            items: Some(texts(items)),
            subsections: None,
        },
        SectionBody::Composite { subsections } => ExportedSection {
            id: section.id.clone(),
            order: section.display_order,
            title: None,
            items: None,
            subsections: Some(
                subsections
                    .iter()
                    .map(|subsection| ExportedSubsection {
                        title: subsection.title.clone(),
                        items: texts(&subsection.items),
                    })
                    .collect(),
            ),
        },
    }
}

pub fn export_json(document: &CanvasDocument) -> Result<String, ExportError> {
    let sections: Vec<ExportedSection> = document.sections.iter().map(exported_section).collect();
    serde_json::to_string_pretty(&sections).map_err(ExportError::Encode)
}

pub fn save_to_path(document: &CanvasDocument, path: &Path) -> Result<(), ExportError> {
    let io_error = |source: std::io::Error| ExportError::Io {
        path: path.display().to_string(),
        source,
    };

    let json = export_json(document)?;
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_error)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = Path::new(&tmp_name);
    fs::write(tmp_path, json).map_err(io_error)?;
    match fs::rename(tmp_path, path) {
        Ok(()) => {}
        Err(rename_err) => {
            if path.exists() {
                fs::remove_file(path).map_err(io_error)?;
                fs::rename(tmp_path, path).map_err(io_error)?;
            } else {
                return Err(io_error(rename_err));
            }
        }
    }

    tracing::info!(path = %path.display(), "canvas exported");
    Ok(())
}


#[cfg(test)]
use import::{import_json, ImportError};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::ListKey;
    use serde_json::{json, Value};
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "lean_canvas_export_{prefix}_{}_{}.json",
            std::process::id(),
            nanos
        ))
    }

    fn filled_document() -> CanvasDocument {
        let mut document = CanvasDocument::lean_canvas();
        let solution = ListKey::section("solution");
        let adopters = ListKey::subsection("customer-segments", "Early Adopter");
        for (key, value) in [
            (&solution, "Faster onboarding"),
            (&solution, "Templates"),
            (&adopters, "Solo founders"),
        ] {
            let added = document.add_item(key).expect("add should succeed");
            document.update_item(key, added.index, value);
        }
        document
    }

    #[test]
    fn export_json_matches_section_shape() {
        let exported: Value =
            serde_json::from_str(&export_json(&filled_document()).expect("export should encode"))
                .expect("export should be valid json");

        assert_eq!(
            exported[1],
            json!({
                "id": "solution",
                "order": 4,
                "title": "Solution",
                "items": ["Faster onboarding", "Templates"]
            })
        );
        assert_eq!(
            exported[6],
            json!({
                "id": "customer-segments",
                "order": 1,
                "subsections": [
                    { "title": "Customer Segments", "items": [] },
                    { "title": "Early Adopter", "items": ["Solo founders"] }
                ]
            })
        );
    }

    #[test]
    fn import_json_restores_exported_document() {
        let document = filled_document();
        let restored =
            import_json(&export_json(&document).expect("export should encode")).expect("import");

        let solution = ListKey::section("solution");
        assert_eq!(
            restored.item_texts(&solution),
            vec!["Faster onboarding", "Templates"]
        );
        assert_eq!(
            export_json(&restored).expect("re-export should encode"),
            export_json(&document).expect("export should encode")
        );
    }

    #[test]
    fn import_json_rejects_over_capacity_lists() {
        let mut exported: Value =
            serde_json::from_str(&export_json(&CanvasDocument::lean_canvas()).expect("export"))
                .expect("valid json");
        exported[1]["items"] = json!(["a", "b", "c", "d"]);

        let error = import_json(&exported.to_string()).expect_err("four items should fail");
        assert!(matches!(error, ImportError::Invalid(_)));
    }

    #[test]
    fn import_json_rejects_wrong_subsection_count() {
        let mut exported: Value =
            serde_json::from_str(&export_json(&CanvasDocument::lean_canvas()).expect("export"))
                .expect("valid json");
        exported[0]["subsections"] = json!([{ "title": "Problem", "items": [] }]);

        let error = import_json(&exported.to_string()).expect_err("one subsection should fail");
        assert!(error.to_string().contains("exactly 2 subsections"));
    }

    #[test]
    fn import_json_rejects_duplicated_section_id() {
        let mut exported: Value =
            serde_json::from_str(&export_json(&CanvasDocument::lean_canvas()).expect("export"))
                .expect("valid json");
        exported[2]["id"] = json!("solution");

        let error = import_json(&exported.to_string()).expect_err("duplicate id should fail");
        assert!(matches!(error, ImportError::Invalid(_)));
        assert!(error.to_string().contains("key-metrics"));
    }

    #[test]
    fn import_json_rejects_changed_order_and_titles() {
        let pristine: Value =
            serde_json::from_str(&export_json(&CanvasDocument::lean_canvas()).expect("export"))
                .expect("valid json");

        let mut reordered = pristine.clone();
        reordered[1]["order"] = json!(42);
        let error = import_json(&reordered.to_string()).expect_err("order 42 should fail");
        assert!(error.to_string().contains("order 4"));

        let mut retitled = pristine.clone();
        retitled[0]["subsections"][1]["title"] = json!("Competitors");
        assert!(import_json(&retitled.to_string()).is_err());

        let mut reshaped = pristine;
        reshaped[1] = json!({ "id": "solution", "order": 4, "subsections": [] });
        assert!(import_json(&reshaped.to_string()).is_err());
    }

    #[test]
    fn save_to_path_writes_export_atomically() {
        let path = temp_file("save");
        let document = filled_document();

        save_to_path(&document, &path).expect("save should succeed");
        save_to_path(&document, &path).expect("overwrite should succeed");

        let written = fs::read_to_string(&path).expect("export file should exist");
        assert_eq!(written, export_json(&document).expect("export should encode"));

        let _ = fs::remove_file(path);
    }
}
