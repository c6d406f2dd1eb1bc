use crate::{ID_FIELD, MONGO_ID_KEY};
use bson::{Bson, Document};

/// type tags of non-string identifiers, `str` escapes strings which look tagged.
const ID_TAGS: [&str; 6] = ["str", "oid", "i32", "i64", "f64", "bson"];

/// Get document identifier string from a mongodb `_id` value.
///
/// A string id is used as it is.  Other types are tagged, like `oid:<hex>` or `i32:9`,
/// so `_id: 9` and `_id: "9"` never share one mirror document.  A string id which
/// already starts with a tag is escaped as `str:<id>`.
/// Returns None for null or undefined id.
pub fn id_to_string(id: &Bson) -> Option<String> {
    let tagged = |tag: &str, repr: String| Some(format!("{}:{}", tag, repr));
    match id {
        Bson::String(s) if has_id_tag(s) => tagged("str", s.clone()),
        Bson::String(s) => Some(s.clone()),
        Bson::ObjectId(oid) => tagged("oid", oid.to_hex()),
        Bson::Int32(i) => tagged("i32", i.to_string()),
        Bson::Int64(i) => tagged("i64", i.to_string()),
        Bson::Double(f) => tagged("f64", format!("{:?}", f)),
        Bson::Null | Bson::Undefined => None,
        other => tagged("bson", other.clone().into_canonical_extjson().to_string()),
    }
}

fn has_id_tag(id: &str) -> bool {
    ID_TAGS.iter().any(|tag| {
        id.strip_prefix(tag)
            .map_or(false, |rest| rest.starts_with(':'))
    })
}

/// Get document identifier from a change event `documentKey`.
pub fn doc_key_id(doc_key: &Document) -> Option<String> {
    doc_key.get(MONGO_ID_KEY).and_then(id_to_string)
}

/// Build the mirrored body of `record`: primary `_id` is removed, and `id` field is
/// set to `id` unless `record` already carries one.
pub fn mirror_body(id: &str, mut record: Document) -> Document {
    record.remove(MONGO_ID_KEY);
    if !record.contains_key(ID_FIELD) {
        record.insert(ID_FIELD, id);
    }
    record
}

#[cfg(test)]
mod test {
    use super::*;
    use bson::{doc, oid::ObjectId};

    #[test]
    fn test_id_to_string() {
        let oid = ObjectId::parse_str("60a74505d6daac52c416bb3f").unwrap();
        assert_eq!(
            id_to_string(&Bson::ObjectId(oid)).unwrap(),
            "oid:60a74505d6daac52c416bb3f"
        );
        assert_eq!(id_to_string(&Bson::String("42".into())).unwrap(), "42");
        assert_eq!(id_to_string(&Bson::Int64(7)).unwrap(), "i64:7");
        assert!(id_to_string(&Bson::Null).is_none());
    }

    #[test]
    fn test_id_types_never_collide() {
        let ids: Vec<String> = vec![
            Bson::Int32(9),
            Bson::Int64(9),
            Bson::Double(9.0),
            Bson::String("9".into()),
            Bson::String("i32:9".into()),
            Bson::String("str:i32:9".into()),
            Bson::Boolean(true),
            Bson::String("true".into()),
        ]
        .iter()
        .map(|id| id_to_string(id).unwrap())
        .collect();
        let unique: std::collections::HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len(), "{:?}", ids);
        assert_eq!(ids[3], "9");
        assert_eq!(ids[4], "str:i32:9");
        assert_eq!(ids[5], "str:str:i32:9");
    }

    #[test]
    fn test_plain_string_with_colon_is_verbatim() {
        assert_eq!(
            id_to_string(&Bson::String("team:42".into())).unwrap(),
            "team:42"
        );
    }

    #[test]
    fn test_doc_key_id() {
        assert_eq!(doc_key_id(&doc! {"_id": "9"}).as_deref(), Some("9"));
        assert_eq!(doc_key_id(&doc! {"_id": 9}).as_deref(), Some("i32:9"));
        assert!(doc_key_id(&doc! {"other": 1}).is_none());
    }

    #[test]
    fn test_mirror_body_injects_id() {
        let body = mirror_body("42", doc! {"_id": "42", "name": "Bo"});
        assert_eq!(body, doc! {"name": "Bo", "id": "42"});
    }

    #[test]
    fn test_mirror_body_keeps_existing_id() {
        let body = mirror_body("42", doc! {"id": 1001, "name": "Bo"});
        assert_eq!(body, doc! {"id": 1001, "name": "Bo"});
    }
}
