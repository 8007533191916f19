// Record model tests

use serde_json::json;
use usersync::models::Record;

#[cfg(test)]
mod record_tests {
    use super::*;

    #[test]
    fn test_identifier_is_normalized() {
        let record = Record::new().with("Email", "  NoReply@Chatter.Salesforce.com ");
        assert_eq!(
            record.identifier("Email").as_deref(),
            Some("noreply@chatter.salesforce.com")
        );
    }

    #[test]
    fn test_identifier_accepts_numbers_and_rejects_blanks() {
        let record = Record::new()
            .with("EmployeeNumber", 4711)
            .with("Email", "   ")
            .with("Manager", json!(null));

        assert_eq!(record.identifier("EmployeeNumber").as_deref(), Some("4711"));
        assert_eq!(record.identifier("Email"), None);
        assert_eq!(record.identifier("Manager"), None);
        assert_eq!(record.identifier("Missing"), None);
    }

    #[test]
    fn test_timestamp_parsing() {
        let record = Record::new()
            .with("LastModifiedDate", "2024-01-15T10:30:00.123Z")
            .with("Broken", "yesterday");

        let at = record.timestamp("LastModifiedDate").unwrap();
        assert_eq!(at.timestamp_millis() % 1000, 123);
        assert!(record.timestamp("Broken").is_none());
    }

    #[test]
    fn test_from_value_requires_object() {
        let record = Record::from_value(json!({"Email": "a@example.com", "Age": 42})).unwrap();
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("Age"), Some(&json!(42)));

        assert!(Record::from_value(json!(["a", "b"])).is_none());
        assert!(Record::from_value(json!("a")).is_none());
    }

    #[test]
    fn test_merge_overwrites_and_keeps() {
        let mut target = Record::new().with("Title", "Nurse").with("Phone", "555");
        let changes = Record::new().with("Title", "Doctor");

        target.merge(&changes);
        assert_eq!(target.get_str("Title"), Some("Doctor"));
        assert_eq!(target.get_str("Phone"), Some("555"));
    }

    #[test]
    fn test_serializes_as_plain_object() {
        let record = Record::new().with("Email", "a@example.com");
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, json!({"Email": "a@example.com"}));
        assert_eq!(record.to_value(), value);

        let back: Record = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
