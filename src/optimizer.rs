//! Object-graph optimization: font/image deduplication and per-page
//! resource collection (spec.md §4.8). Reshapes the object graph in
//! place; has no observable failure modes beyond the usual
//! `MissingObject`/`UnexpectedType` propagation from a malformed page
//! tree.

use std::collections::{BTreeMap, HashMap};

use sha2::{Digest, Sha256};

use crate::dictionary::Dictionary;
use crate::document::Document;
use crate::object::Object;
use crate::{ObjectId, Result};

/// Counts of what [`Optimizer::deduplicate`] actually did, for callers
/// that want to log or report savings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizationReport {
    pub fonts_merged: usize,
    pub images_merged: usize,
    pub objects_freed: usize,
}

/// The font/image XObjects referenced from one page's `/Resources`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageResources {
    pub fonts: Vec<ObjectId>,
    pub x_objects: Vec<ObjectId>,
}

pub struct Optimizer<'a> {
    document: &'a mut Document,
}

impl<'a> Optimizer<'a> {
    pub fn new(document: &'a mut Document) -> Self {
        Optimizer { document }
    }

    /// Merge duplicate font dictionaries (keyed by `/BaseFont` plus a
    /// descriptor fingerprint) and duplicate image XObjects (keyed by
    /// decoded-payload hash), rewriting every reference to the
    /// surviving canonical object and freeing the discards.
    pub fn deduplicate(&mut self) -> Result<OptimizationReport> {
        let mut remap: BTreeMap<ObjectId, ObjectId> = BTreeMap::new();
        let fonts = self.dedupe_fonts()?;
        let images = self.dedupe_images()?;
        let report = OptimizationReport {
            fonts_merged: fonts.len(),
            images_merged: images.len(),
            objects_freed: 0,
        };
        remap.extend(fonts);
        remap.extend(images);

        if remap.is_empty() {
            return Ok(report);
        }
        self.rewrite_references(&remap);
        let mut freed = 0;
        for discarded in remap.keys() {
            self.document.free_object(*discarded);
            freed += 1;
        }
        Ok(OptimizationReport { objects_freed: freed, ..report })
    }

    fn dedupe_fonts(&self) -> Result<BTreeMap<ObjectId, ObjectId>> {
        let mut seen: HashMap<String, ObjectId> = HashMap::new();
        let mut remap = BTreeMap::new();
        for (&id, obj) in self.document.objects.iter() {
            let dict = match obj.as_dict() {
                Ok(d) if d.has_type(b"Font") => d,
                _ => continue,
            };
            let key = self.font_fingerprint(dict);
            match seen.get(&key) {
                Some(&canonical) => {
                    remap.insert(id, canonical);
                }
                None => {
                    seen.insert(key, id);
                }
            }
        }
        Ok(remap)
    }

    fn font_fingerprint(&self, dict: &Dictionary) -> String {
        let base_font = dict.get(b"BaseFont").and_then(Object::as_name).unwrap_or(b"").to_vec();
        let subtype = dict.get(b"Subtype").and_then(Object::as_name).unwrap_or(b"").to_vec();
        let descriptor_fp = dict
            .get(b"FontDescriptor")
            .ok()
            .and_then(|o| self.document.dereference(o).ok())
            .and_then(|(_, obj)| obj.as_dict().ok().map(dict_fingerprint))
            .unwrap_or_default();
        format!(
            "{}\u{0}{}\u{0}{}",
            String::from_utf8_lossy(&base_font),
            String::from_utf8_lossy(&subtype),
            descriptor_fp
        )
    }

    fn dedupe_images(&self) -> Result<BTreeMap<ObjectId, ObjectId>> {
        let mut seen: HashMap<[u8; 32], ObjectId> = HashMap::new();
        let mut remap = BTreeMap::new();
        for (&id, obj) in self.document.objects.iter() {
            let stream = match obj.as_stream() {
                Ok(s) => s,
                Err(_) => continue,
            };
            let is_image = stream.dict.get(b"Subtype").and_then(Object::as_name).map(|n| n == b"Image").unwrap_or(false);
            if !is_image {
                continue;
            }
            let decoded = match stream.decode() {
                Ok(d) => d,
                Err(_) => continue,
            };
            let hash: [u8; 32] = Sha256::digest(&decoded).into();
            match seen.get(&hash) {
                Some(&canonical) => {
                    remap.insert(id, canonical);
                }
                None => {
                    seen.insert(hash, id);
                }
            }
        }
        Ok(remap)
    }

    fn rewrite_references(&mut self, remap: &BTreeMap<ObjectId, ObjectId>) {
        for obj in self.document.objects.values_mut() {
            rewrite_obj(obj, remap);
        }
        rewrite_dict(&mut self.document.trailer, remap);
    }

    /// Walk the page tree from `/Root/Pages`, collecting each leaf
    /// page's `/Resources` font and XObject references, keyed by the
    /// page's own object id.
    pub fn collect_page_resources(&self) -> Result<BTreeMap<ObjectId, PageResources>> {
        let root_ref = self.document.trailer.get(b"Root")?;
        let (_, root_obj) = self.document.dereference(root_ref)?;
        let pages_ref = root_obj.as_dict()?.get(b"Pages")?.clone();
        let mut out = BTreeMap::new();
        self.walk_pages(&pages_ref, &mut out)?;
        Ok(out)
    }

    fn walk_pages(&self, node: &Object, out: &mut BTreeMap<ObjectId, PageResources>) -> Result<()> {
        let (id, resolved) = self.document.dereference(node)?;
        let dict = resolved.as_dict()?;
        if dict.has_type(b"Pages") {
            if let Ok(kids) = dict.get(b"Kids").and_then(Object::as_array) {
                for kid in kids.to_vec() {
                    self.walk_pages(&kid, out)?;
                }
            }
            return Ok(());
        }
        out.insert(id, self.page_resources(dict)?);
        Ok(())
    }

    fn page_resources(&self, page: &Dictionary) -> Result<PageResources> {
        let mut resources = PageResources::default();
        let Ok(res_obj) = page.get(b"Resources") else {
            return Ok(resources);
        };
        let (_, res) = self.document.dereference(res_obj)?;
        let res_dict = match res.as_dict() {
            Ok(d) => d,
            Err(_) => return Ok(resources),
        };
        if let Ok(fonts) = res_dict.get(b"Font").and_then(Object::as_dict) {
            resources.fonts = fonts.iter().filter_map(|(_, v)| v.as_reference().ok()).collect();
        }
        if let Ok(x_objects) = res_dict.get(b"XObject").and_then(Object::as_dict) {
            resources.x_objects = x_objects.iter().filter_map(|(_, v)| v.as_reference().ok()).collect();
        }
        Ok(resources)
    }
}

fn dict_fingerprint(dict: &Dictionary) -> String {
    let mut pairs: Vec<(String, String)> =
        dict.iter().map(|(k, v)| (String::from_utf8_lossy(k).into_owned(), format!("{v:?}"))).collect();
    pairs.sort();
    format!("{pairs:?}")
}

fn rewrite_obj(obj: &mut Object, remap: &BTreeMap<ObjectId, ObjectId>) {
    match obj {
        Object::Reference(n, g) => {
            if let Some(&(canon_n, canon_g)) = remap.get(&(*n, *g)) {
                *n = canon_n;
                *g = canon_g;
            }
        }
        Object::Array(items) => {
            for item in items {
                rewrite_obj(item, remap);
            }
        }
        Object::Dictionary(dict) => rewrite_dict(dict, remap),
        Object::Stream(stream) => rewrite_dict(&mut stream.dict, remap),
        _ => {}
    }
}

fn rewrite_dict(dict: &mut Dictionary, remap: &BTreeMap<ObjectId, ObjectId>) {
    for (_, v) in dict.iter_mut() {
        rewrite_obj(v, remap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary;
    use crate::stream::Stream;

    #[test]
    fn merges_identical_fonts_and_rewrites_references() {
        let mut doc = Document::new();
        let font_a = doc.add_object(dictionary! { "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Helvetica" });
        let font_b = doc.add_object(dictionary! { "Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Helvetica" });
        let page = doc.add_object(dictionary! {
            "Type" => "Page",
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_a, "F2" => font_b } },
        });
        doc.trailer.set("Root", page);

        let mut optimizer = Optimizer::new(&mut doc);
        let report = optimizer.deduplicate().unwrap();
        assert_eq!(report.fonts_merged, 1);
        assert_eq!(report.objects_freed, 1);

        let page_dict = doc.get_object(page).unwrap().as_dict().unwrap();
        let fonts = page_dict.get(b"Resources").unwrap().as_dict().unwrap().get(b"Font").unwrap().as_dict().unwrap();
        assert_eq!(fonts.get(b"F1").unwrap().as_reference().unwrap(), fonts.get(b"F2").unwrap().as_reference().unwrap());
    }

    #[test]
    fn merges_identical_images_by_decoded_content() {
        let mut doc = Document::new();
        let image_a = doc.add_object(Stream::new(dictionary! { "Subtype" => "Image", "Width" => 1, "Height" => 1 }, vec![1, 2, 3]));
        let image_b = doc.add_object(Stream::new(dictionary! { "Subtype" => "Image", "Width" => 1, "Height" => 1 }, vec![1, 2, 3]));
        doc.trailer.set("Ignore", dictionary! { "A" => image_a, "B" => image_b });

        let mut optimizer = Optimizer::new(&mut doc);
        let report = optimizer.deduplicate().unwrap();
        assert_eq!(report.images_merged, 1);
    }

    #[test]
    fn collects_resources_from_a_single_page() {
        let mut doc = Document::new();
        let font = doc.add_object(dictionary! { "Type" => "Font" });
        let page = doc.add_object(dictionary! {
            "Type" => "Page",
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font } },
        });
        let pages = doc.add_object(dictionary! { "Type" => "Pages", "Kids" => Object::Array(vec![page.into()]) });
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages });
        doc.trailer.set("Root", catalog);

        let optimizer = Optimizer::new(&mut doc);
        let resources = optimizer.collect_page_resources().unwrap();
        assert_eq!(resources.get(&page).unwrap().fonts, vec![font]);
    }
}
