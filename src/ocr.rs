//! Embedded-image extraction and OCR.
//!
//! Walks the PDF's page resources for image XObjects, writes each image
//! stream to the configured images directory, and runs an external OCR
//! command over the saved file. The OCR engine is opaque: any command that
//! accepts `<command> <image> stdout` works (tesseract by default).
//!
//! Failure policy: one bad image (undecodable stream, failed write, OCR
//! command error) is reported on stderr and skipped; the walk continues.

use anyhow::{bail, Context, Result};
use lopdf::{Dictionary, Document as PdfDocument, Object};
use std::path::{Path, PathBuf};

use crate::models::{ContentItem, ContentKind};

/// An image stream pulled out of the PDF and written to disk.
#[derive(Debug, Clone)]
pub struct SavedImage {
    /// 1-based page number the image was embedded on.
    pub page: u32,
    pub path: PathBuf,
}

/// Extract embedded images from PDF bytes into `images_dir`.
///
/// Files are named `page{P}_img{I}.{ext}` with the extension derived from
/// the stream filter. Returns the saved images in page order. Individual
/// image failures are logged and skipped.
pub fn extract_images(bytes: &[u8], images_dir: &Path) -> Result<Vec<SavedImage>> {
    let doc = PdfDocument::load_mem(bytes).context("Failed to parse PDF for image extraction")?;

    std::fs::create_dir_all(images_dir)
        .with_context(|| format!("Failed to create images dir: {}", images_dir.display()))?;

    let mut saved = Vec::new();

    for (page_num, page_id) in doc.get_pages() {
        let streams = match page_image_streams(&doc, page_id) {
            Ok(streams) => streams,
            Err(e) => {
                eprintln!("Warning: page {}: cannot read resources: {}", page_num, e);
                continue;
            }
        };

        for (img_index, (data, ext)) in streams.into_iter().enumerate() {
            let filename = format!("page{}_img{}.{}", page_num, img_index + 1, ext);
            let path = images_dir.join(filename);
            match std::fs::write(&path, &data) {
                Ok(()) => saved.push(SavedImage {
                    page: page_num,
                    path,
                }),
                Err(e) => {
                    eprintln!(
                        "Warning: page {}: failed to save image {}: {}",
                        page_num,
                        path.display(),
                        e
                    );
                }
            }
        }
    }

    Ok(saved)
}

/// Collect the raw stream bytes and a file extension for every image
/// XObject referenced by a page's resources.
fn page_image_streams(doc: &PdfDocument, page_id: (u32, u16)) -> Result<Vec<(Vec<u8>, String)>> {
    let page_dict = doc.get_dictionary(page_id)?;

    let resources = match page_dict.get(b"Resources") {
        Ok(obj) => resolve_dict(doc, obj)?,
        Err(_) => return Ok(Vec::new()),
    };

    let xobjects = match resources.get(b"XObject") {
        Ok(obj) => resolve_dict(doc, obj)?,
        Err(_) => return Ok(Vec::new()),
    };

    let mut streams = Vec::new();
    for (_name, obj) in xobjects.iter() {
        let resolved = match obj {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(o) => o,
                Err(e) => {
                    eprintln!("Warning: unresolvable XObject reference: {}", e);
                    continue;
                }
            },
            other => other,
        };

        if let Object::Stream(stream) = resolved {
            let is_image = stream
                .dict
                .get(b"Subtype")
                .and_then(|o| o.as_name())
                .map(|n| n == b"Image")
                .unwrap_or(false);
            if !is_image {
                continue;
            }
            let ext = image_extension(&stream.dict);
            streams.push((stream.content.clone(), ext));
        }
    }

    Ok(streams)
}

fn resolve_dict<'a>(doc: &'a PdfDocument, obj: &'a Object) -> Result<&'a Dictionary> {
    match obj {
        Object::Reference(id) => Ok(doc.get_dictionary(*id)?),
        Object::Dictionary(dict) => Ok(dict),
        _ => bail!("expected dictionary in page resources"),
    }
}

/// Pick a file extension from the stream's Filter entry. DCT and JPX
/// streams are self-contained image formats; anything else is written
/// as-is and left to the OCR engine (which will skip what it can't read).
fn image_extension(dict: &Dictionary) -> String {
    let filter_name = match dict.get(b"Filter") {
        Ok(Object::Name(name)) => Some(name.clone()),
        Ok(Object::Array(arr)) => arr.iter().find_map(|o| match o {
            Object::Name(name) => Some(name.clone()),
            _ => None,
        }),
        _ => None,
    };

    match filter_name.as_deref() {
        Some(b"DCTDecode") => "jpg".to_string(),
        Some(b"JPXDecode") => "jp2".to_string(),
        Some(b"CCITTFaxDecode") => "tif".to_string(),
        _ => "bin".to_string(),
    }
}

/// Run the OCR command over each saved image and build [`ContentItem`]s
/// from the non-empty results. Per-image failures are logged and skipped.
pub fn ocr_items(images: &[SavedImage], ocr_command: &str) -> Vec<ContentItem> {
    if ocr_command.is_empty() {
        return Vec::new();
    }

    let mut items = Vec::new();
    for image in images {
        let text = match run_ocr(ocr_command, &image.path) {
            Ok(text) => text,
            Err(e) => {
                eprintln!(
                    "Warning: OCR failed for {}: {}",
                    image.path.display(),
                    e
                );
                continue;
            }
        };
        if text.is_empty() {
            continue;
        }
        items.push(ContentItem {
            content: format!("Image OCR (Page {}):\n{}", image.page, text),
            page: image.page,
            kind: ContentKind::ImageOcr,
            table_number: None,
            image_path: Some(image.path.display().to_string()),
        });
    }
    items
}

/// Invoke `<command> <image> stdout` and capture the text it prints.
fn run_ocr(command: &str, image: &Path) -> Result<String> {
    let output = std::process::Command::new(command)
        .arg(image)
        .arg("stdout")
        .output()
        .with_context(|| format!("Failed to run OCR command '{}'", command))?;

    if !output.status.success() {
        bail!("'{}' exited with {}", command, output.status);
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A valid single-page PDF with no embedded images.
    fn pdf_without_images() -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");
        let o1 = out.len();
        out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
        let o2 = out.len();
        out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
        let o3 = out.len();
        out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >> endobj\n");
        let xref_start = out.len();
        out.extend_from_slice(b"xref\n0 4\n");
        out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
        out.extend_from_slice(format!("{:010} 00000 n \n", o1).as_bytes());
        out.extend_from_slice(format!("{:010} 00000 n \n", o2).as_bytes());
        out.extend_from_slice(format!("{:010} 00000 n \n", o3).as_bytes());
        out.extend_from_slice(b"trailer << /Size 4 /Root 1 0 R >>\nstartxref\n");
        out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
        out.extend_from_slice(b"%%EOF\n");
        out
    }

    #[test]
    fn pdf_with_no_images_yields_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let saved = extract_images(&pdf_without_images(), tmp.path()).unwrap();
        assert!(saved.is_empty());
    }

    #[test]
    fn unparseable_pdf_is_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(extract_images(b"garbage", tmp.path()).is_err());
    }

    #[test]
    fn missing_ocr_command_skips_images() {
        let tmp = tempfile::tempdir().unwrap();
        let img = tmp.path().join("page1_img1.jpg");
        std::fs::write(&img, b"\xff\xd8\xff").unwrap();
        let images = vec![SavedImage {
            page: 1,
            path: img,
        }];
        let items = ocr_items(&images, "docchat-test-no-such-ocr-command");
        assert!(items.is_empty());
    }

    #[test]
    fn empty_command_disables_ocr() {
        let items = ocr_items(
            &[SavedImage {
                page: 1,
                path: PathBuf::from("x.jpg"),
            }],
            "",
        );
        assert!(items.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn ocr_output_becomes_item_with_page_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let img = tmp.path().join("page3_img1.jpg");
        std::fs::write(&img, b"\xff\xd8\xff").unwrap();
        let images = vec![SavedImage {
            page: 3,
            path: img.clone(),
        }];
        // `echo <image> stdout` stands in for a real OCR engine.
        let items = ocr_items(&images, "echo");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].page, 3);
        assert_eq!(items[0].kind, ContentKind::ImageOcr);
        assert!(items[0].content.starts_with("Image OCR (Page 3):\n"));
        assert_eq!(items[0].image_path.as_deref(), Some(img.display().to_string().as_str()));
    }
}
