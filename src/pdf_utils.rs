use lopdf::{Document, Object, ObjectId};
use std::collections::BTreeMap;

use crate::error::RenderError;

// ── Merge PDFs ──────────────────────────────────────────────────

/// Concatenates rendered DANFEs into one document for batch printing.
pub fn merge_pdfs(inputs: Vec<Vec<u8>>) -> Result<Vec<u8>, RenderError> {
    if inputs.is_empty() {
        return Err(RenderError::Merge("nenhum documento para unir".into()));
    }
    if inputs.len() == 1 {
        return Ok(inputs.into_iter().next().unwrap_or_default());
    }

    let documents: Vec<Document> = inputs
        .iter()
        .enumerate()
        .map(|(i, bytes)| {
            Document::load_mem(bytes)
                .map_err(|e| RenderError::Merge(format!("documento {}: {}", i + 1, e)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut max_id = 1;
    let mut documents_pages: Vec<Vec<ObjectId>> = Vec::new();
    let mut documents_objects: Vec<BTreeMap<ObjectId, Object>> = Vec::new();

    for mut doc in documents {
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        documents_pages.push(doc.get_pages().into_values().collect());
        documents_objects.push(doc.objects);
    }

    let mut merged = Document::with_version("1.5");

    for objects in &documents_objects {
        for (id, object) in objects {
            merged.objects.insert(*id, object.clone());
        }
    }

    let mut catalog_id: Option<ObjectId> = None;
    let mut pages_id: Option<ObjectId> = None;

    for (id, object) in &merged.objects {
        if let Ok(dict) = object.as_dict() {
            let type_name = dict
                .get(b"Type")
                .ok()
                .and_then(|t| t.as_name_str().ok());
            match type_name {
                Some("Catalog") if catalog_id.is_none() => catalog_id = Some(*id),
                Some("Pages") if pages_id.is_none() => {
                    if dict
                        .get(b"Parent")
                        .ok()
                        .and_then(|p| p.as_reference().ok())
                        .is_none()
                    {
                        pages_id = Some(*id);
                    }
                }
                _ => {}
            }
        }
    }

    let catalog_id = catalog_id
        .ok_or_else(|| RenderError::Merge("catálogo do PDF não encontrado".into()))?;
    let pages_id = pages_id
        .ok_or_else(|| RenderError::Merge("objeto de páginas do PDF não encontrado".into()))?;

    let all_page_ids: Vec<ObjectId> = documents_pages.into_iter().flatten().collect();

    if let Some(Ok(dict)) = merged.objects.get_mut(&pages_id).map(Object::as_dict_mut) {
        dict.set(
            "Kids",
            all_page_ids
                .iter()
                .map(|id| Object::Reference(*id))
                .collect::<Vec<Object>>(),
        );
        dict.set("Count", Object::Integer(all_page_ids.len() as i64));
    }

    for page_id in &all_page_ids {
        if let Some(Ok(dict)) = merged.objects.get_mut(page_id).map(Object::as_dict_mut) {
            dict.set("Parent", Object::Reference(pages_id));
        }
    }

    if let Some(Ok(dict)) = merged.objects.get_mut(&catalog_id).map(Object::as_dict_mut) {
        dict.set("Pages", Object::Reference(pages_id));
        dict.remove(b"Outlines");
    }

    merged.trailer.set("Root", Object::Reference(catalog_id));
    merged.max_id = max_id;
    merged.renumber_objects();
    merged.compress();

    let mut buffer = Vec::new();
    merged.save_to(&mut buffer)?;
    Ok(buffer)
}

// ── PDF Info ────────────────────────────────────────────────────

#[derive(serde::Serialize, Clone, Debug, PartialEq, Eq)]
pub struct PdfInfo {
    pub size: usize,
    pub page_count: usize,
}

pub fn pdf_info(bytes: &[u8]) -> Result<PdfInfo, RenderError> {
    let doc = Document::load_mem(bytes)?;
    Ok(PdfInfo {
        size: bytes.len(),
        page_count: doc.get_pages().len(),
    })
}
