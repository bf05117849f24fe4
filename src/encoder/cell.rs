//! BSON value to CSV cell text
//!
//! Scalars render as plain text, nested documents and arrays as compact
//! relaxed Extended JSON. Null and absent values render as the empty field.

use mongodb::bson::{Binary, Bson, DateTime, Document, Regex, Timestamp};

/// Core trait for BSON value conversion
pub trait BsonConverter {
    /// Output type of the conversion
    type Output;

    /// Convert a BSON value to the output type
    fn convert(&self, value: &Bson) -> Self::Output;

    /// Convert an optional BSON value, absent values becoming the default
    fn convert_optional(&self, value: Option<&Bson>) -> Self::Output
    where
        Self::Output: Default,
    {
        value.map(|v| self.convert(v)).unwrap_or_default()
    }
}

/// Plain text converter used for CSV cells
#[derive(Debug, Default, Clone, Copy)]
pub struct CellConverter;

impl CellConverter {
    pub fn new() -> Self {
        Self
    }

    fn format_datetime(&self, dt: &DateTime) -> String {
        dt.try_to_rfc3339_string().unwrap_or_else(|_| dt.to_string())
    }

    fn format_nested(&self, value: &Bson) -> String {
        value.clone().into_relaxed_extjson().to_string()
    }

    fn format_document(&self, doc: &Document) -> String {
        self.format_nested(&Bson::Document(doc.clone()))
    }

    fn format_binary(&self, bin: &Binary) -> String {
        hex::encode(&bin.bytes)
    }

    fn format_regex(&self, regex: &Regex) -> String {
        format!("/{}/{}", regex.pattern, regex.options)
    }

    fn format_timestamp(&self, ts: &Timestamp) -> String {
        format!("Timestamp({}, {})", ts.time, ts.increment)
    }
}

impl BsonConverter for CellConverter {
    type Output = String;

    fn convert(&self, value: &Bson) -> String {
        match value {
            Bson::String(s) => s.clone(),
            Bson::Int32(n) => n.to_string(),
            Bson::Int64(n) => n.to_string(),
            Bson::Double(f) => f.to_string(),
            Bson::Decimal128(d) => d.to_string(),
            Bson::Boolean(b) => b.to_string(),
            Bson::Null | Bson::Undefined => String::new(),
            Bson::ObjectId(oid) => oid.to_hex(),
            Bson::DateTime(dt) => self.format_datetime(dt),
            Bson::Document(doc) => self.format_document(doc),
            Bson::Array(_) => self.format_nested(value),
            Bson::Binary(bin) => self.format_binary(bin),
            Bson::RegularExpression(regex) => self.format_regex(regex),
            Bson::Timestamp(ts) => self.format_timestamp(ts),
            Bson::MinKey => String::from("MinKey"),
            Bson::MaxKey => String::from("MaxKey"),
            _ => self.format_nested(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{doc, oid::ObjectId, spec::BinarySubtype};

    #[test]
    fn test_scalars() {
        let converter = CellConverter::new();
        assert_eq!(converter.convert(&Bson::String("hi".into())), "hi");
        assert_eq!(converter.convert(&Bson::Int32(7)), "7");
        assert_eq!(converter.convert(&Bson::Int64(-9)), "-9");
        assert_eq!(converter.convert(&Bson::Double(1.5)), "1.5");
        assert_eq!(converter.convert(&Bson::Boolean(false)), "false");
        assert_eq!(converter.convert(&Bson::Null), "");
    }

    #[test]
    fn test_absent_value_is_empty() {
        assert_eq!(CellConverter::new().convert_optional(None), "");
    }

    #[test]
    fn test_object_id_as_hex() {
        let oid = ObjectId::parse_str("65f1c0ffee0000000000abcd").unwrap();
        assert_eq!(
            CellConverter::new().convert(&Bson::ObjectId(oid)),
            "65f1c0ffee0000000000abcd"
        );
    }

    #[test]
    fn test_datetime_as_rfc3339() {
        let dt = DateTime::from_millis(0);
        assert_eq!(
            CellConverter::new().convert(&Bson::DateTime(dt)),
            "1970-01-01T00:00:00Z"
        );
    }

    #[test]
    fn test_nested_values_as_compact_json() {
        let converter = CellConverter::new();
        let nested = doc! { "city": "Oslo", "zip": 150 };
        assert_eq!(
            converter.convert(&Bson::Document(nested)),
            r#"{"city":"Oslo","zip":150}"#
        );
        let array = Bson::Array(vec![Bson::Int32(1), Bson::String("x".into())]);
        assert_eq!(converter.convert(&array), r#"[1,"x"]"#);
    }

    #[test]
    fn test_binary_as_hex() {
        let bin = Binary {
            subtype: BinarySubtype::Generic,
            bytes: vec![0xde, 0xad],
        };
        assert_eq!(CellConverter::new().convert(&Bson::Binary(bin)), "dead");
    }
}
