use crate::common::{DOC_ID, OPERATOR_PREFIX};
use crate::document::Document;
use crate::errors::{ErrorKind, LodeError, LodeResult};
use crate::update::{bad_update, Modifier};

/// A parsed update expression.
///
/// An expression whose top-level keys all start with `$` is a list of modifiers; one without
/// any such key replaces the whole document, keeping its `_id`.
///
/// # Examples
///
/// ```rust
/// use lodestore::doc;
/// use lodestore::update::UpdateSpec;
///
/// let original = doc! { _id: "id1", planet: "Earth", visits: 1 };
///
/// let modify = UpdateSpec::parse(&doc! { "$inc": { visits: 2 } }).unwrap();
/// assert_eq!(modify.apply(&original).unwrap(), doc! { _id: "id1", planet: "Earth", visits: 3 });
///
/// let replace = UpdateSpec::parse(&doc! { planet: "Mars" }).unwrap();
/// assert_eq!(replace.apply(&original).unwrap(), doc! { _id: "id1", planet: "Mars" });
/// ```
#[derive(Debug, Clone)]
pub enum UpdateSpec {
    Replace(Document),
    Modify(Vec<Modifier>),
}

impl UpdateSpec {
    pub fn parse(doc: &Document) -> LodeResult<UpdateSpec> {
        let operator_keys = doc
            .keys()
            .filter(|k| k.starts_with(OPERATOR_PREFIX))
            .count();

        if operator_keys == 0 {
            return Ok(UpdateSpec::Replace(doc.clone()));
        }
        if operator_keys != doc.size() {
            return Err(bad_update("You cannot mix modifiers and normal fields"));
        }

        let mut modifiers = Vec::new();
        for (name, arg) in doc.iter() {
            modifiers.extend(Modifier::parse(name, arg)?);
        }
        Ok(UpdateSpec::Modify(modifiers))
    }

    /// Whether the expression explicitly writes the top-level `field`.
    pub fn touches(&self, field: &str) -> bool {
        match self {
            UpdateSpec::Replace(doc) => doc.contains_key(field),
            UpdateSpec::Modify(modifiers) => modifiers
                .iter()
                .any(|m| m.paths().iter().any(|path| *path == field)),
        }
    }

    /// Computes the updated version of `original` without touching it.
    ///
    /// Fails with [ErrorKind::DocumentValidation] if the result would change `_id` or break
    /// the field naming rules.
    pub fn apply(&self, original: &Document) -> LodeResult<Document> {
        let updated = match self {
            UpdateSpec::Replace(replacement) => {
                let mut updated = replacement.clone();
                if let Some(id) = original.id() {
                    if updated.id().is_some_and(|new_id| new_id != id) {
                        return Err(id_change());
                    }
                    updated.put_first(DOC_ID, id.clone());
                }
                updated
            }
            UpdateSpec::Modify(modifiers) => {
                let mut updated = original.clone();
                for modifier in modifiers {
                    modifier.apply(&mut updated)?;
                }
                if let Some(id) = original.id() {
                    if updated.id() != Some(id) {
                        return Err(id_change());
                    }
                }
                updated
            }
        };

        updated.validate_keys()?;
        Ok(updated)
    }
}

fn id_change() -> LodeError {
    log::error!("You cannot change a document's _id");
    LodeError::new(
        "You cannot change a document's _id",
        ErrorKind::DocumentValidation,
    )
}
