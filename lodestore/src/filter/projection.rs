use crate::common::DOC_ID;
use crate::document::Document;
use crate::errors::{ErrorKind, LodeError, LodeResult};

/// A field projection applied to query results.
///
/// Either every listed field is kept (inclusion, `1`/`true`) or every listed field is
/// dropped (exclusion, `0`/`false`). `_id` is kept unless explicitly excluded and may be
/// combined with either mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    fields: Vec<String>,
    include: bool,
    keep_id: bool,
}

impl Projection {
    pub fn parse(doc: &Document) -> LodeResult<Projection> {
        let mut keep_id = true;
        let mut mode: Option<bool> = None;
        let mut fields = Vec::new();

        for (key, value) in doc.iter() {
            let include = value.is_truthy();
            if key == DOC_ID {
                keep_id = include;
                continue;
            }
            match mode {
                Some(current) if current != include => {
                    log::error!("Can't both keep and omit fields except for _id");
                    return Err(LodeError::new(
                        "Can't both keep and omit fields except for _id",
                        ErrorKind::BadQuery,
                    ));
                }
                _ => mode = Some(include),
            }
            fields.push(key.clone());
        }

        Ok(Projection {
            fields,
            include: mode.unwrap_or(false),
            keep_id,
        })
    }

    pub fn apply(&self, doc: &Document) -> LodeResult<Document> {
        let mut projected = if self.include {
            let mut projected = Document::new();
            for field in self.fields.iter() {
                if let Some(value) = doc.get_path(field) {
                    projected.set_path(field, value)?;
                }
            }
            if self.keep_id {
                if let Some(id) = doc.id() {
                    projected.put_first(DOC_ID, id.clone());
                }
            }
            projected
        } else {
            let mut projected = doc.clone();
            for field in self.fields.iter() {
                projected.unset_path(field);
            }
            projected
        };

        if !self.keep_id {
            projected.remove(DOC_ID);
        }
        Ok(projected)
    }
}
