// JSON implementation of the Serializer port.

use crate::core::ports::{Serializer, StoreError};
use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonSerializer;

impl Serializer for JsonSerializer {
    fn serialize<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, StoreError> {
        serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod json_serializer_tests {
    use super::*;
    use crate::core::commit::{EventMessage, Headers};
    use rstest::rstest;

    #[rstest]
    fn it_should_preserve_event_order_and_headers() {
        let events = vec![
            EventMessage::new(1_u32).with_header("user", "u-1"),
            EventMessage::new(2_u32),
        ];
        let bytes = JsonSerializer.serialize(&events).unwrap();
        let restored: Vec<EventMessage<u32>> = JsonSerializer.deserialize(&bytes).unwrap();
        assert_eq!(restored, events);
    }

    #[rstest]
    fn it_should_default_missing_headers_to_an_empty_map() {
        let restored: EventMessage<u32> = JsonSerializer.deserialize(br#"{"body":7}"#).unwrap();
        assert_eq!(restored.headers, Headers::new());
        assert_eq!(restored.body, Some(7));
    }

    #[rstest]
    fn it_should_report_malformed_payloads_as_serialization_errors() {
        let result: Result<Vec<EventMessage<u32>>, _> = JsonSerializer.deserialize(b"not json");
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }
}
