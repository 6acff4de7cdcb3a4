//! JSON Schema sent as the structured-output constraint.

use serde_json::{json, Value as JsonValue};

use crate::wire::ResponseFormat;

pub const SCHEMA_NAME: &str = "generated_events";

pub fn event_response_schema() -> JsonValue {
    json!({
        "name": SCHEMA_NAME,
        "strict": true,
        "schema": {
            "type": "object",
            "properties": {
                "events": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "title": { "type": "string" },
                            "description": { "type": "string" },
                            "date": {
                                "type": "string",
                                "description": "Local date-time, YYYY-MM-DDTHH:mm"
                            },
                            "tags": {
                                "type": "array",
                                "items": { "type": "string" }
                            },
                            "location": {
                                "type": "object",
                                "properties": {
                                    "latitude": { "type": "number" },
                                    "longitude": { "type": "number" }
                                },
                                "required": ["latitude", "longitude"],
                                "additionalProperties": false
                            }
                        },
                        "required": ["title", "description", "date", "tags", "location"],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["events"],
            "additionalProperties": false
        }
    })
}

pub fn response_format() -> ResponseFormat {
    ResponseFormat::JsonSchema {
        json_schema: event_response_schema(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_strict_and_closed_at_every_object_level() {
        let schema = event_response_schema();
        assert_eq!(schema["strict"], true);

        let root = &schema["schema"];
        assert_eq!(root["required"], json!(["events"]));
        assert_eq!(root["additionalProperties"], false);

        let item = &root["properties"]["events"]["items"];
        assert_eq!(
            item["required"],
            json!(["title", "description", "date", "tags", "location"])
        );
        assert_eq!(item["additionalProperties"], false);
        assert_eq!(item["properties"]["tags"]["items"]["type"], "string");
        assert_eq!(item["properties"]["location"]["additionalProperties"], false);
        assert_eq!(
            item["properties"]["location"]["properties"]["latitude"]["type"],
            "number"
        );
    }

    #[test]
    fn response_format_wraps_the_schema() {
        match response_format() {
            ResponseFormat::JsonSchema { json_schema } => {
                assert_eq!(json_schema["name"], SCHEMA_NAME)
            }
            other => panic!("unexpected format {other:?}"),
        }
    }
}
