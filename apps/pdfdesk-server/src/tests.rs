//! Tests for the pdfdesk server
//!
//! Test categories:
//! - Form value parsing (proptest)
//! - HTTP endpoints end to end with axum-test, against a temporary storage
//!   root and a stub page renderer

#[cfg(test)]
mod property_tests {
    use proptest::prelude::*;

    use crate::api::{content_type_for, parse_quality};

    proptest! {
        /// Property: any integer quality is accepted and clamped to 1..=100
        #[test]
        fn numeric_quality_is_clamped(value in any::<i64>()) {
            let quality = parse_quality(&value.to_string(), 95).unwrap();
            prop_assert!((1..=100).contains(&quality));
            if (1..=100).contains(&value) {
                prop_assert_eq!(quality as i64, value);
            }
        }

        /// Property: text that is not an integer is rejected
        #[test]
        fn non_numeric_quality_is_rejected(raw in "[a-zA-Z%.]{1,10}") {
            prop_assert!(parse_quality(&raw, 95).is_err());
        }

        /// Property: unknown extensions download as a generic byte stream
        #[test]
        fn unknown_extensions_are_octet_stream(stem in "[a-z]{1,8}", ext in "[a-z]{4,6}") {
            let name = format!("{}.{}", stem, ext);
            prop_assert_eq!(content_type_for(&name), "application/octet-stream");
        }
    }

    #[test]
    fn blank_quality_uses_default() {
        assert_eq!(parse_quality("", 50).unwrap(), 50);
        assert_eq!(parse_quality("  ", 95).unwrap(), 95);
    }
}

#[cfg(test)]
mod http_tests {
    //! HTTP endpoint integration tests using axum-test

    use std::io::Cursor;
    use std::sync::Arc;

    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;
    use image::{Rgb, RgbImage};
    use lopdf::{dictionary, Document, Object, Stream};
    use pdfdesk_core::assemble::{protect, to_bytes};
    use pdfdesk_core::{DeskConfig, PageRenderer, PdfDesk, PdfDeskError};
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use tempfile::TempDir;

    use crate::api::{router, AppState};

    /// One white 8x8 bitmap per page
    struct StubRenderer;

    impl PageRenderer for StubRenderer {
        fn render(&self, pdf: &[u8], _dpi: u16) -> Result<Vec<RgbImage>, PdfDeskError> {
            let doc = Document::load_mem(pdf)
                .map_err(|e| PdfDeskError::ConversionFailed(e.to_string()))?;
            Ok((0..doc.get_pages().len())
                .map(|_| RgbImage::from_pixel(8, 8, Rgb([255, 255, 255])))
                .collect())
        }
    }

    /// Create a test server over a fresh storage root
    fn create_test_server() -> (TempDir, TestServer) {
        let root = TempDir::new().unwrap();
        let config = DeskConfig::new(root.path().join("uploads"), root.path().join("processed"));
        let desk = PdfDesk::with_renderer(config, Box::new(StubRenderer)).unwrap();
        let state = AppState {
            desk: Arc::new(desk),
        };

        let server = TestServer::new(router(state, 10 * 1024 * 1024)).unwrap();
        (root, server)
    }

    /// PDF with `pages` pages, each showing `(<label>-<n>)`
    fn sample_pdf(pages: u32, label: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let kids: Vec<Object> = (1..=pages)
            .map(|n| {
                let content = format!("BT /F1 12 Tf 72 720 Td ({}-{}) Tj ET", label, n);
                let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
                let page_id = doc.add_object(dictionary! {
                    "Type" => "Page",
                    "Parent" => pages_id,
                    "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                    "Contents" => content_id,
                });
                Object::Reference(page_id)
            })
            .collect();

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    fn protected_pdf(pages: u32, password: &str) -> Vec<u8> {
        let mut doc = Document::load_mem(&sample_pdf(pages, "Locked")).unwrap();
        protect(&mut doc, password).unwrap();
        to_bytes(&mut doc).unwrap()
    }

    fn sample_png() -> Vec<u8> {
        let mut bytes = Vec::new();
        RgbImage::from_pixel(24, 12, Rgb([10, 120, 200]))
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn pdf_part(bytes: Vec<u8>, name: &str) -> Part {
        Part::bytes(bytes)
            .file_name(name.to_string())
            .mime_type("application/pdf")
    }

    fn single_file_form(bytes: Vec<u8>, name: &str) -> MultipartForm {
        MultipartForm::new().add_part("file", pdf_part(bytes, name))
    }

    /// Download the artifact named in a success body
    async fn download(server: &TestServer, json: &Value) -> Vec<u8> {
        let filename = json["filename"].as_str().unwrap();
        let response = server.get(&format!("/download/{}", filename)).await;
        response.assert_status_ok();
        response.as_bytes().to_vec()
    }

    #[tokio::test]
    async fn test_health_returns_200() {
        let (_root, server) = create_test_server();
        let response = server.get("/health").await;
        response.assert_status_ok();

        let json = response.json::<Value>();
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["service"], "pdfdesk-server");
    }

    #[tokio::test]
    async fn test_unlock_requires_file() {
        let (_root, server) = create_test_server();

        let response = server
            .post("/api/unlock-pdf")
            .multipart(MultipartForm::new().add_text("password", "pw"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let json = response.json::<Value>();
        assert_eq!(json["success"], false);
        assert_eq!(json["code"], "MISSING_INPUT");
    }

    #[tokio::test]
    async fn test_unlock_with_wrong_password() {
        let (_root, server) = create_test_server();

        let response = server
            .post("/api/unlock-pdf")
            .multipart(single_file_form(protected_pdf(1, "right"), "locked.pdf").add_text("password", "wrong"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["code"], "DECRYPTION_FAILED");
    }

    #[tokio::test]
    async fn test_rejects_disallowed_file_type() {
        let (_root, server) = create_test_server();

        let form = MultipartForm::new().add_part(
            "file",
            Part::bytes(b"hello".to_vec()).file_name("notes.txt"),
        );
        let response = server.post("/api/compress-pdf").multipart(form).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["code"], "INVALID_FILE_TYPE");
    }

    #[tokio::test]
    async fn test_protect_then_unlock_round_trip() {
        let (_root, server) = create_test_server();

        let response = server
            .post("/api/protect-pdf")
            .multipart(single_file_form(sample_pdf(2, "Plain"), "plain.pdf").add_text("password", "s3cret"))
            .await;
        response.assert_status_ok();
        let json = response.json::<Value>();
        assert_eq!(json["success"], true);
        assert_eq!(json["filename"], "protected_plain.pdf");
        assert_eq!(json["is_zip"], false);

        let protected = download(&server, &json).await;

        let check = server
            .post("/api/check-pdf-encryption")
            .multipart(single_file_form(protected.clone(), "protected_plain.pdf"))
            .await;
        check.assert_status_ok();
        assert_eq!(check.json::<Value>()["is_encrypted"], true);

        let unlocked = server
            .post("/api/unlock-pdf")
            .multipart(single_file_form(protected, "protected_plain.pdf").add_text("password", "s3cret"))
            .await;
        unlocked.assert_status_ok();
        let json = unlocked.json::<Value>();
        assert_eq!(json["filename"], "unlocked_protected_plain.pdf");

        let doc = Document::load_mem(&download(&server, &json).await).unwrap();
        assert!(!doc.is_encrypted());
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[tokio::test]
    async fn test_protect_requires_password() {
        let (_root, server) = create_test_server();

        let response = server
            .post("/api/protect-pdf")
            .multipart(single_file_form(sample_pdf(1, "Plain"), "plain.pdf"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["code"], "MISSING_INPUT");
    }

    #[tokio::test]
    async fn test_merge_pdfs() {
        let (_root, server) = create_test_server();

        let form = MultipartForm::new()
            .add_part("files", pdf_part(sample_pdf(2, "A"), "a.pdf"))
            .add_part("files", pdf_part(sample_pdf(1, "B"), "b.pdf"));
        let response = server.post("/api/merge-pdfs").multipart(form).await;

        response.assert_status_ok();
        let json = response.json::<Value>();
        let filename = json["filename"].as_str().unwrap();
        assert!(filename.starts_with("merged_") && filename.ends_with(".pdf"));

        let download = server.get(&format!("/download/{}", filename)).await;
        download.assert_status_ok();
        assert_eq!(download.header("content-type"), "application/pdf");
        let doc = Document::load_mem(download.as_bytes()).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
    }

    #[tokio::test]
    async fn test_merge_needs_two_files() {
        let (_root, server) = create_test_server();

        let form = MultipartForm::new().add_part("files", pdf_part(sample_pdf(1, "A"), "a.pdf"));
        let response = server.post("/api/merge-pdfs").multipart(form).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["success"], false);
    }

    #[tokio::test]
    async fn test_merge_with_unreadable_file_fails_when_too_few_remain() {
        let (_root, server) = create_test_server();

        let form = MultipartForm::new()
            .add_part("files", pdf_part(sample_pdf(1, "A"), "a.pdf"))
            .add_part("files", pdf_part(protected_pdf(1, "pw"), "locked.pdf"));
        let response = server.post("/api/merge-pdfs").multipart(form).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["code"], "NO_VALID_INPUT");
    }

    #[tokio::test]
    async fn test_split_all_returns_zip() {
        let (_root, server) = create_test_server();

        let response = server
            .post("/api/split-pdf")
            .multipart(single_file_form(sample_pdf(3, "S"), "book.pdf").add_text("split_type", "all"))
            .await;

        response.assert_status_ok();
        let json = response.json::<Value>();
        assert_eq!(json["filename"], "split_book.zip");
        assert_eq!(json["is_zip"], true);

        let bytes = download(&server, &json).await;
        let archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 3);
    }

    #[tokio::test]
    async fn test_split_range() {
        let (_root, server) = create_test_server();

        let response = server
            .post("/api/split-pdf")
            .multipart(
                single_file_form(sample_pdf(5, "S"), "book.pdf")
                    .add_text("split_type", "range")
                    .add_text("page_range", "2-3"),
            )
            .await;

        response.assert_status_ok();
        let json = response.json::<Value>();
        assert_eq!(json["filename"], "split_pages_2-3.pdf");
        let doc = Document::load_mem(&download(&server, &json).await).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[tokio::test]
    async fn test_split_rejects_unknown_type() {
        let (_root, server) = create_test_server();

        let response = server
            .post("/api/split-pdf")
            .multipart(single_file_form(sample_pdf(2, "S"), "book.pdf").add_text("split_type", "odd"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["code"], "INVALID_FORMAT");
    }

    #[tokio::test]
    async fn test_reorder_pdf() {
        let (_root, server) = create_test_server();

        let response = server
            .post("/api/reorder-pdf")
            .multipart(single_file_form(sample_pdf(3, "R"), "deck.pdf").add_text("page_order", "3,1,2"))
            .await;

        response.assert_status_ok();
        let json = response.json::<Value>();
        assert_eq!(json["filename"], "reordered_deck.pdf");

        let doc = Document::load_mem(&download(&server, &json).await).unwrap();
        let first = *doc.get_pages().get(&1).unwrap();
        let content = String::from_utf8_lossy(&doc.get_page_content(first).unwrap()).into_owned();
        assert!(content.contains("(R-3)"));
    }

    #[tokio::test]
    async fn test_pdf_to_images_single_page() {
        let (_root, server) = create_test_server();

        let response = server
            .post("/api/convert-pdf-to-images")
            .multipart(single_file_form(sample_pdf(1, "I"), "one.pdf").add_text("quality", "80"))
            .await;

        response.assert_status_ok();
        let json = response.json::<Value>();
        assert_eq!(json["filename"], "images_one_page_1.jpg");
        assert_eq!(json["is_zip"], false);

        let download = server.get("/download/images_one_page_1.jpg").await;
        assert_eq!(download.header("content-type"), "image/jpeg");
    }

    #[tokio::test]
    async fn test_pdf_to_images_rejects_non_numeric_quality() {
        let (_root, server) = create_test_server();

        let response = server
            .post("/api/convert-pdf-to-images")
            .multipart(single_file_form(sample_pdf(1, "I"), "one.pdf").add_text("quality", "high"))
            .await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["code"], "INVALID_REQUEST");
    }

    #[tokio::test]
    async fn test_images_to_pdf() {
        let (_root, server) = create_test_server();

        let form = MultipartForm::new()
            .add_part("files", Part::bytes(sample_png()).file_name("a.png").mime_type("image/png"))
            .add_part("files", Part::bytes(sample_png()).file_name("b.png").mime_type("image/png"));
        let response = server.post("/api/convert-images-to-pdf").multipart(form).await;

        response.assert_status_ok();
        let json = response.json::<Value>();
        assert!(json["filename"].as_str().unwrap().starts_with("converted_"));

        let doc = Document::load_mem(&download(&server, &json).await).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[tokio::test]
    async fn test_compress_pdf() {
        let (_root, server) = create_test_server();

        let response = server
            .post("/api/compress-pdf")
            .multipart(single_file_form(sample_pdf(2, "C"), "big.pdf").add_text("quality", "30"))
            .await;

        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["filename"], "compressed_big.pdf");
    }

    #[tokio::test]
    async fn test_check_encryption_plain() {
        let (_root, server) = create_test_server();

        let response = server
            .post("/api/check-pdf-encryption")
            .multipart(single_file_form(sample_pdf(4, "P"), "plain.pdf"))
            .await;

        response.assert_status_ok();
        let json = response.json::<Value>();
        assert_eq!(json["success"], true);
        assert_eq!(json["is_encrypted"], false);
        assert_eq!(json["page_count"], 4);
        assert_eq!(json["filename"], "plain.pdf");
    }

    #[tokio::test]
    async fn test_download_unknown_file_is_404() {
        let (_root, server) = create_test_server();

        let response = server.get("/download/nothing-here.pdf").await;
        response.assert_status_not_found();
        assert_eq!(response.json::<Value>()["code"], "NOT_FOUND");

        let traversal = server.get("/download/..%2Fuploads%2Fsecret.pdf").await;
        traversal.assert_status_not_found();
    }
}
