//! In-memory PDF builders shared by the pipeline tests.

use lopdf::dictionary;
use lopdf::{Document, Object, Stream};

/// Content of one synthetic page.
#[derive(Debug, Clone, Default)]
pub struct PageSpec {
    pub text: Option<String>,
    pub image: bool,
    /// Put the image inside a Form XObject instead of directly on the page.
    pub image_in_form: bool,
}

impl PageSpec {
    pub fn text(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            ..Self::default()
        }
    }

    pub fn with_image(text: &str) -> Self {
        Self {
            text: Some(text.to_string()),
            image: true,
            ..Self::default()
        }
    }

    pub fn blank() -> Self {
        Self::default()
    }
}

fn image_stream() -> Stream {
    let mut stream = Stream::new(
        dictionary! {
            "Type" => Object::Name(b"XObject".to_vec()),
            "Subtype" => Object::Name(b"Image".to_vec()),
            "Width" => Object::Integer(1),
            "Height" => Object::Integer(1),
            "ColorSpace" => Object::Name(b"DeviceGray".to_vec()),
            "BitsPerComponent" => Object::Integer(8),
        },
        vec![0u8],
    );
    stream.allows_compression = false;
    stream
}

/// Build a PDF with one page per `PageSpec`, using Helvetica for text.
pub fn build_pdf(pages: &[PageSpec]) -> Vec<u8> {
    let mut doc = Document::with_version("1.4");

    let font_id = doc.add_object(dictionary! {
        "Type" => Object::Name(b"Font".to_vec()),
        "Subtype" => Object::Name(b"Type1".to_vec()),
        "BaseFont" => Object::Name(b"Helvetica".to_vec()),
    });

    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();

    for page in pages {
        let content = match &page.text {
            Some(text) => format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET"),
            None => String::new(),
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));

        let mut xobjects = lopdf::Dictionary::new();
        if page.image {
            let img_id = doc.add_object(Object::Stream(image_stream()));
            xobjects.set("Im1", Object::Reference(img_id));
        }
        if page.image_in_form {
            let img_id = doc.add_object(Object::Stream(image_stream()));
            let form = Stream::new(
                dictionary! {
                    "Type" => Object::Name(b"XObject".to_vec()),
                    "Subtype" => Object::Name(b"Form".to_vec()),
                    "BBox" => vec![0.into(), 0.into(), 100.into(), 100.into()],
                    "Resources" => dictionary! {
                        "XObject" => dictionary! {
                            "Inner" => Object::Reference(img_id),
                        },
                    },
                },
                b"q 100 0 0 100 0 0 cm /Inner Do Q".to_vec(),
            );
            let form_id = doc.add_object(Object::Stream(form));
            xobjects.set("Fm1", Object::Reference(form_id));
        }

        let page_id = doc.add_object(dictionary! {
            "Type" => Object::Name(b"Page".to_vec()),
            "Parent" => Object::Reference(pages_id),
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => Object::Reference(content_id),
            "Resources" => dictionary! {
                "Font" => dictionary! {
                    "F1" => Object::Reference(font_id),
                },
                "XObject" => Object::Dictionary(xobjects),
            },
        });
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => Object::Name(b"Pages".to_vec()),
            "Kids" => kids,
            "Count" => Object::Integer(count),
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => Object::Name(b"Catalog".to_vec()),
        "Pages" => Object::Reference(pages_id),
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

/// `n` text-only pages, each with a short distinct sentence.
pub fn text_only_pdf(n: usize) -> Vec<u8> {
    let pages: Vec<PageSpec> = (0..n)
        .map(|i| PageSpec::text(&format!("Page {} discusses the cohort.", i + 1)))
        .collect();
    build_pdf(&pages)
}
