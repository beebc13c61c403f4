use docx_rs::{DocumentChild, Paragraph, ParagraphChild, RunChild};

/// Extract body paragraphs from DOCX bytes, in document order.
///
/// Empty paragraphs are kept here (as empty strings) so the caller decides
/// numbering; table cells are not body paragraphs and are ignored.
pub fn docx_paragraphs(docx_bytes: &[u8]) -> Result<Vec<String>, String> {
    let docx = docx_rs::read_docx(docx_bytes).map_err(|e| e.to_string())?;

    Ok(docx
        .document
        .children
        .iter()
        .filter_map(|child| match child {
            DocumentChild::Paragraph(p) => Some(paragraph_text(p)),
            _ => None,
        })
        .collect())
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    collect_children(&paragraph.children, &mut text);
    text
}

fn collect_children(children: &[ParagraphChild], out: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => {
                for rc in &run.children {
                    match rc {
                        RunChild::Text(t) => out.push_str(&t.text),
                        RunChild::Tab(_) | RunChild::Break(_) => out.push(' '),
                        _ => {}
                    }
                }
            }
            ParagraphChild::Hyperlink(link) => collect_children(&link.children, out),
            _ => {}
        }
    }
}

#[cfg(test)]
pub(crate) fn build_docx(paragraphs: &[&str]) -> Vec<u8> {
    use docx_rs::{Docx, Paragraph, Run};

    let mut docx = Docx::new();
    for text in paragraphs {
        docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(*text)));
    }
    let mut cursor = std::io::Cursor::new(Vec::new());
    docx.build().pack(&mut cursor).unwrap();
    cursor.into_inner()
}
