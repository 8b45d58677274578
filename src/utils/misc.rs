use mongodb::bson::{oid::ObjectId, Bson};
use regex::{Captures, Regex};
use serde::{Deserialize, Deserializer};
use std::{
    collections::HashMap,
    time::{SystemTime, UNIX_EPOCH},
};

/// Get EPOCH timestamp in seconds
pub fn get_epoch_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// All the shapes an identifier may be stored with in a document.
/// The value itself is always tried, 24 char hex strings also as ObjectId
/// and integer strings also as numbers.
pub fn id_candidates(id: &str) -> Vec<Bson> {
    let mut candidates = vec![Bson::String(id.to_owned())];
    if let Ok(oid) = ObjectId::parse_str(id) {
        candidates.push(Bson::ObjectId(oid));
    }
    if let Ok(n) = id.parse::<i64>() {
        candidates.push(Bson::Int64(n));
        if let Ok(n) = i32::try_from(n) {
            candidates.push(Bson::Int32(n));
        }
    }
    candidates
}

/// Deserialize helper for identifier fields which may be stored as
/// ObjectId, string or number
pub fn deserialize_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = Option::<Bson>::deserialize(deserializer)?;
    Ok(val.as_ref().and_then(id_to_string))
}

/// String form of an identifier value, `None` for unsupported types
pub fn id_to_string(val: &Bson) -> Option<String> {
    match val {
        Bson::ObjectId(oid) => Some(oid.to_hex()),
        Bson::String(s) if !s.trim().is_empty() => Some(s.to_owned()),
        Bson::Int32(n) => Some(n.to_string()),
        Bson::Int64(n) => Some(n.to_string()),
        _ => None,
    }
}

/// replace placeholder variables from the template text
/// placeholders are of patters {{variable}}, unknown ones are kept as is
pub fn replace_placeholders(s: &str, options: &HashMap<String, String>) -> anyhow::Result<String> {
    let re = Regex::new(r"\{\{\s*(\w+)\s*\}\}")?;
    let replaced = re.replace_all(s, |cap: &Captures| match options.get(&cap[1]) {
        Some(val) => val.to_owned(),
        None => cap[0].to_owned(),
    });
    Ok(replaced.into_owned())
}

#[cfg(test)]
mod tests {
    use mongodb::bson::doc;

    use super::*;

    #[test]
    fn test_get_epoch_ts() {
        let ts = get_epoch_ts();
        // 2020-01-01
        assert!(ts > 1_577_836_800);
    }

    #[test]
    fn test_id_candidates() {
        let oid = ObjectId::new();
        assert_eq!(
            id_candidates(&oid.to_hex()),
            vec![Bson::String(oid.to_hex()), Bson::ObjectId(oid)]
        );
        assert_eq!(id_candidates("u1"), vec![Bson::String("u1".into())]);
        assert_eq!(
            id_candidates("42"),
            vec![Bson::String("42".into()), Bson::Int64(42), Bson::Int32(42)]
        );
    }

    #[test]
    fn test_deserialize_id() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(default, deserialize_with = "deserialize_id")]
            id: Option<String>,
        }
        let oid = ObjectId::new();
        let cases = [
            (doc! {"id": oid}, Some(oid.to_hex())),
            (doc! {"id": "r1"}, Some("r1".to_owned())),
            (doc! {"id": 7_i32}, Some("7".to_owned())),
            (doc! {"id": ""}, None),
            (doc! {"id": Bson::Null}, None),
            (doc! {}, None),
        ];
        for (doc, expected) in cases {
            let holder: Holder = mongodb::bson::from_document(doc).unwrap();
            assert_eq!(holder.id, expected);
        }
    }

    #[test]
    fn test_replace_placeholders() {
        let mut options = HashMap::new();
        options.insert("title".to_owned(), "Pay bill".to_owned());
        options.insert("name".to_owned(), "Ana".to_owned());
        let text = replace_placeholders("Hi {{name}}, {{ title }} ({{title}})", &options).unwrap();
        assert_eq!(text, "Hi Ana, Pay bill (Pay bill)");
        let text = replace_placeholders("{{unknown}} stays", &options).unwrap();
        assert_eq!(text, "{{unknown}} stays");
    }
}
