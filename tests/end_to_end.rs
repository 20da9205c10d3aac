//! End-to-end scenarios exercising the reader, writer, and filter
//! pipeline together through the crate's public API.

use pdfcore::filters::FilterStage;
use pdfcore::{dictionary, CryptMethod, Document, EncryptSetup, Error, LoadOptions, Permissions, SaveOptions, Stream, XrefError};

const TINY_PDF: &[u8] = b"%PDF-1.5\n1 0 obj<</Type/Catalog/Pages 2 0 R>>endobj\n2 0 obj<</Type/Pages/Kids[3 0 R]/Count 1>>endobj\n3 0 obj<</Type/Page/Parent 2 0 R/MediaBox[0 0 612 792]>>endobj\nxref\n0 4\n0000000000 65535 f \n0000000009 00000 n \n0000000052 00000 n \n0000000101 00000 n \ntrailer\n<</Root 1 0 R/Size 4>>\nstartxref\n164\n%%EOF";

#[test]
fn round_trip_tiny_document_through_the_classic_writer() {
    let mut doc = Document::new();
    let catalog = dictionary! { "Type" => "Catalog" };
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_with_options(&mut out, SaveOptions::builder().use_xref_streams(false).build()).unwrap();

    let root = doc.trailer.get(b"Root").unwrap().clone();
    let (_, first) = doc.dereference(&root).unwrap();

    let reloaded = Document::load_mem(&out).unwrap();
    let reloaded_root = reloaded.trailer.get(b"Root").unwrap().clone();
    let (_, second) = reloaded.dereference(&reloaded_root).unwrap();

    assert_eq!(first, second);
    assert!(first.as_dict().unwrap().has_type(b"Catalog"));
}

#[test]
fn flate_round_trip_preserves_eleven_bytes() {
    let original = b"hello\nworld".to_vec();
    let mut stream = Stream::new(dictionary! {}, original.clone());

    let pipeline = vec![FilterStage::new(b"FlateDecode".to_vec())];
    stream.compress_with(&pipeline).unwrap();
    let decoded_once = stream.decode().unwrap();
    assert_eq!(decoded_once, original);
    assert_eq!(decoded_once.len(), 11);

    // Re-encode from scratch and confirm the second round trip agrees.
    stream.decompress().unwrap();
    stream.compress_with(&pipeline).unwrap();
    let decoded_twice = stream.decode().unwrap();
    assert_eq!(decoded_twice, original);
}

#[test]
fn xref_stream_with_compressed_objects_round_trips_and_downgrades_to_classic() {
    let mut doc = Document::new();
    let catalog = dictionary! { "Type" => "Catalog", "Pages" => (2u32, 0u16) };
    doc.insert_object((1, 0), catalog);
    let pages = dictionary! { "Type" => "Pages", "Kids" => Vec::<pdfcore::Object>::new(), "Count" => 0 };
    doc.insert_object((2, 0), pages);
    let info = dictionary! { "Title" => "packed" };
    doc.insert_object((3, 0), info);
    doc.trailer.set("Root", (1u32, 0u16));

    let mut packed_out = Vec::new();
    let packed_options = SaveOptions::builder().use_xref_streams(true).use_object_streams(true).build();
    doc.save_with_options(&mut packed_out, packed_options).unwrap();
    assert!(String::from_utf8_lossy(&packed_out).contains("/Type /ObjStm"));

    let reopened = Document::load_mem(&packed_out).unwrap();
    let root = reopened.trailer.get(b"Root").unwrap().clone();
    let (_, catalog_obj) = reopened.dereference(&root).unwrap();
    assert!(catalog_obj.as_dict().unwrap().has_type(b"Catalog"));
    let pages_ref = catalog_obj.as_dict().unwrap().get(b"Pages").unwrap().clone();
    let (_, pages_obj) = reopened.dereference(&pages_ref).unwrap();
    assert!(pages_obj.as_dict().unwrap().has_type(b"Pages"));

    let mut classic_out = Vec::new();
    let mut reopened = reopened;
    let classic_options = SaveOptions::builder().use_xref_streams(false).use_object_streams(false).build();
    reopened.save_with_options(&mut classic_out, classic_options).unwrap();
    let classic_text = String::from_utf8_lossy(&classic_out);
    assert!(!classic_text.contains("/Type /ObjStm"));
    assert!(!classic_text.contains("/Type /XRef"));

    let reopened_again = Document::load_mem(&classic_out).unwrap();
    let root = reopened_again.trailer.get(b"Root").unwrap().clone();
    let (_, catalog_again) = reopened_again.dereference(&root).unwrap();
    assert_eq!(catalog_obj, catalog_again);
}

#[test]
fn relaxed_mode_repairs_a_startxref_pointing_past_eof() {
    let truncated = String::from_utf8_lossy(TINY_PDF).replace("startxref\n164\n%%EOF", "startxref\n999999\n%%EOF");

    let clean = Document::load_mem(TINY_PDF).unwrap();
    let clean_root = clean.trailer.get(b"Root").unwrap().clone();
    let (_, clean_catalog) = clean.dereference(&clean_root).unwrap();

    let repaired = Document::load_mem(truncated.as_bytes()).unwrap();
    assert!(!repaired.warnings.is_empty());
    let repaired_root = repaired.trailer.get(b"Root").unwrap().clone();
    let (_, repaired_catalog) = repaired.dereference(&repaired_root).unwrap();
    assert_eq!(clean_catalog, repaired_catalog);

    let strict_err =
        Document::load_mem_with_options(truncated.as_bytes(), LoadOptions::new().strict()).unwrap_err();
    assert!(matches!(strict_err, Error::Xref(XrefError::UnparseableOffset)));
}

#[test]
fn a_document_encrypted_with_new_aes_256_passwords_round_trips() {
    let mut doc = Document::new();
    let catalog = dictionary! { "Type" => "Catalog" };
    let catalog_id = doc.add_object(catalog);
    doc.trailer.set("Root", catalog_id);
    let secret_id = doc.add_object(pdfcore::Object::string_literal(b"a secret note"));

    let setup = EncryptSetup {
        user_password: "user-pw".to_string(),
        owner_password: "owner-pw".to_string(),
        permissions: Permissions::PRINT,
        method: CryptMethod::Aes256,
        encrypt_metadata: true,
    };
    doc.encrypt(setup).unwrap();

    let mut out = Vec::new();
    doc.save_with_options(&mut out, SaveOptions::builder().use_xref_streams(false).build()).unwrap();

    let reloaded = Document::load_mem(&out).unwrap();
    assert!(reloaded.authenticate_password("wrong").is_err());
    reloaded.authenticate_password("user-pw").unwrap();
    reloaded.authenticate_password("owner-pw").unwrap();

    let opts = LoadOptions::new().with_password("user-pw");
    let decrypted = Document::load_mem_with_options(&out, opts).unwrap();
    let root = decrypted.trailer.get(b"Root").unwrap().clone();
    let (_, catalog_obj) = decrypted.dereference(&root).unwrap();
    assert!(catalog_obj.as_dict().unwrap().has_type(b"Catalog"));
    let (_, secret) = decrypted.dereference(&pdfcore::Object::Reference(secret_id.0, secret_id.1)).unwrap();
    assert_eq!(secret.as_str().unwrap(), b"a secret note");
}
